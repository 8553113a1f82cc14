/*
[INPUT]:  Symbol identifiers and query parameters
[OUTPUT]: Market data (ping, time, book ticker, depth, symbol filters)
[POS]:    HTTP layer - public market data endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::http::{AsterClient, AsterError, Result};
use crate::types::{BookTicker, Depth, SymbolFilters};

#[derive(Debug, Deserialize)]
struct ServerTime {
    #[serde(rename = "serverTime")]
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
struct ExchangeSymbol {
    symbol: String,
    filters: Vec<ExchangeFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum ExchangeFilter {
    #[serde(rename = "PRICE_FILTER")]
    Price {
        #[serde(rename = "tickSize", with = "rust_decimal::serde::str")]
        tick_size: Decimal,
    },
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize", with = "rust_decimal::serde::str")]
        step_size: Decimal,
    },
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional {
        #[serde(rename = "minNotional", with = "rust_decimal::serde::str")]
        min_notional: Decimal,
    },
    #[serde(other)]
    Other,
}

impl AsterClient {
    /// Connectivity check
    ///
    /// GET /api/v1/ping
    pub async fn ping(&self) -> Result<()> {
        let builder = self.public_request(Method::GET, "/api/v1/ping")?;
        self.send_ok(builder).await
    }

    /// Server time in epoch milliseconds
    ///
    /// GET /api/v1/time
    pub async fn server_time(&self) -> Result<i64> {
        let builder = self.public_request(Method::GET, "/api/v1/time")?;
        let time: ServerTime = self.send_json(builder).await?;
        Ok(time.server_time)
    }

    /// Best bid/ask for a symbol
    ///
    /// GET /api/v1/ticker/bookTicker?symbol={symbol}
    pub async fn book_ticker(&self, symbol: &str) -> Result<BookTicker> {
        let endpoint = format!("/api/v1/ticker/bookTicker?symbol={symbol}");
        let builder = self.public_request(Method::GET, &endpoint)?;
        self.send_json(builder).await
    }

    /// Order book depth
    ///
    /// GET /api/v1/depth?symbol={symbol}&limit={limit}
    pub async fn depth(&self, symbol: &str, limit: u32) -> Result<Depth> {
        let endpoint = format!("/api/v1/depth?symbol={symbol}&limit={limit}");
        let builder = self.public_request(Method::GET, &endpoint)?;
        self.send_json(builder).await
    }

    /// Granularity filters for a symbol, extracted from exchange info
    ///
    /// GET /api/v1/exchangeInfo
    pub async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let builder = self.public_request(Method::GET, "/api/v1/exchangeInfo")?;
        let info: ExchangeInfo = self.send_json(builder).await?;

        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| {
                AsterError::InvalidResponse(format!("symbol {symbol} not in exchangeInfo"))
            })?;

        let mut tick_size = None;
        let mut step_size = None;
        let mut min_notional = None;
        for filter in entry.filters {
            match filter {
                ExchangeFilter::Price { tick_size: value } => tick_size = Some(value),
                ExchangeFilter::LotSize { step_size: value } => step_size = Some(value),
                ExchangeFilter::MinNotional { min_notional: value } => min_notional = Some(value),
                ExchangeFilter::Other => {}
            }
        }

        match (tick_size, step_size, min_notional) {
            (Some(tick_size), Some(step_size), Some(min_notional)) => Ok(SymbolFilters {
                tick_size,
                step_size,
                min_notional,
            }),
            _ => Err(AsterError::InvalidResponse(format!(
                "incomplete filters for symbol {symbol}"
            ))),
        }
    }
}
