/*
[INPUT]:  JSON payloads from the spot API
[OUTPUT]: Typed models with Decimal fields
[POS]:    Data layer - response models
[UPDATE]: When endpoints gain or lose fields
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::enums::{OrderStatus, OrderType, Side};

/// Acknowledgement returned when an order is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub symbol: String,
    pub order_id: i64,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub orig_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
}

/// Full order snapshot as returned by the order-query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderState {
    pub symbol: String,
    pub order_id: i64,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub orig_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
    /// Quote volume actually traded so far.
    #[serde(with = "rust_decimal::serde::str")]
    pub cummulative_quote_qty: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
}

impl OrderState {
    /// Average fill price, derived from traded quote volume.
    pub fn avg_fill_price(&self) -> Option<Decimal> {
        if self.executed_qty.is_zero() {
            return None;
        }
        Some(self.cummulative_quote_qty / self.executed_qty)
    }

    /// Quantity still resting on the book (zero once terminal).
    pub fn unfilled_qty(&self) -> Decimal {
        if self.executed_qty >= self.orig_qty {
            Decimal::ZERO
        } else {
            self.orig_qty - self.executed_qty
        }
    }
}

/// Best bid/ask snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTicker {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_qty: Decimal,
}

///// One price level: (price, quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel(
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
);

impl DepthLevel {
    pub fn price(&self) -> Decimal {
        self.0
    }

    pub fn qty(&self) -> Decimal {
        self.1
    }
}

/// Order book depth snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl Depth {
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }
}

/// Free/locked balance for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// Account snapshot; only balances are consumed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub balances: Vec<AssetBalance>,
}

impl AccountInfo {
    /// Free balance for an asset, zero when the asset is absent.
    pub fn free_balance(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .find(|balance| balance.asset == asset)
            .map(|balance| balance.free)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Instrument granularity constraints extracted from exchangeInfo filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_notional: Decimal,
}

/// Maker/taker commission rates for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRate {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub maker_commission_rate: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub taker_commission_rate: Decimal,
}
