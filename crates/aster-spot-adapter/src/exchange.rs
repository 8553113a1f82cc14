/*
[INPUT]:  Exchange operations needed by trading strategies
[OUTPUT]: SpotExchange trait and its AsterClient implementation
[POS]:    Capability seam - strategies depend on this trait, not the client
[UPDATE]: When strategies need new exchange operations
*/

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::http::{AsterClient, Result};
use crate::types::{
    AccountInfo, BookTicker, CommissionRate, Depth, OrderAck, OrderState, Side, SymbolFilters,
    TimeInForce,
};

/// Capability surface of a spot exchange.
///
/// Strategies take `Arc<dyn SpotExchange>` so tests can substitute a mock.
#[async_trait]
pub trait SpotExchange: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker>;

    async fn depth(&self, symbol: &str, limit: u32) -> Result<Depth>;

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters>;

    async fn commission_rate(&self, symbol: &str) -> Result<CommissionRate>;

    async fn account(&self) -> Result<AccountInfo>;

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderAck>;

    async fn place_market_order(&self, symbol: &str, side: Side, qty: Decimal)
        -> Result<OrderAck>;

    async fn query_order(&self, symbol: &str, order_id: i64) -> Result<OrderState>;

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<OrderState>;

    async fn open_orders(&self, symbol: &str) -> Result<Vec<OrderState>>;
}

#[async_trait]
impl SpotExchange for AsterClient {
    async fn ping(&self) -> Result<()> {
        AsterClient::ping(self).await
    }

    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker> {
        AsterClient::book_ticker(self, symbol).await
    }

    async fn depth(&self, symbol: &str, limit: u32) -> Result<Depth> {
        AsterClient::depth(self, symbol, limit).await
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        AsterClient::symbol_filters(self, symbol).await
    }

    async fn commission_rate(&self, symbol: &str) -> Result<CommissionRate> {
        AsterClient::commission_rate(self, symbol).await
    }

    async fn account(&self) -> Result<AccountInfo> {
        AsterClient::account(self).await
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderAck> {
        AsterClient::place_limit_order(self, symbol, side, qty, price, time_in_force).await
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<OrderAck> {
        AsterClient::place_market_order(self, symbol, side, qty).await
    }

    async fn query_order(&self, symbol: &str, order_id: i64) -> Result<OrderState> {
        AsterClient::query_order(self, symbol, order_id).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<OrderState> {
        AsterClient::cancel_order(self, symbol, order_id).await
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<OrderState>> {
        AsterClient::open_orders(self, symbol).await
    }
}
