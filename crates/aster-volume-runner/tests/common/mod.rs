/*
[INPUT]:  Scripted fill behavior and balances from tests
[OUTPUT]: In-memory SpotExchange implementation
[POS]:    Test support - mock exchange shared by integration tests
[UPDATE]: When tests need new scripting knobs
*/

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use aster_spot_adapter::{
    AccountInfo, AssetBalance, AsterError, BookTicker, CommissionRate, Depth, DepthLevel,
    OrderAck, OrderState, OrderStatus, OrderType, Result, Side, SpotExchange, SymbolFilters,
    TimeInForce,
};

pub const SYMBOL: &str = "ASTERUSDT";
pub const BASE: &str = "ASTER";
pub const QUOTE: &str = "USDT";

pub fn decimal(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal")
}

/// How a scripted limit leg behaves inside the monitor window.
#[derive(Debug, Clone, Copy)]
pub enum FillMode {
    /// Fills in full on the first poll.
    Full,
    /// Fills this many units and then rests.
    Partial(Decimal),
    /// Never trades.
    None,
    /// Already cancelled by the exchange with this much executed.
    Dead(Decimal),
}

struct Inner {
    balances: HashMap<String, Decimal>,
    orders: HashMap<i64, OrderState>,
    next_id: i64,
    sell_mode: FillMode,
    buy_mode: FillMode,
    fail_limit_side: Option<Side>,
    fail_order_queries: bool,
    ticker: BookTicker,
    filters: SymbolFilters,
    maker_rate: Decimal,
    taker_rate: Decimal,
    market_orders: Vec<(Side, Decimal)>,
    apply_market_to_balance: bool,
}

/// Scriptable in-memory exchange.
pub struct MockExchange {
    inner: Mutex<Inner>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                balances: HashMap::from([
                    (BASE.to_string(), decimal("1000")),
                    (QUOTE.to_string(), decimal("1000")),
                ]),
                orders: HashMap::new(),
                next_id: 1,
                sell_mode: FillMode::Full,
                buy_mode: FillMode::Full,
                fail_limit_side: None,
                fail_order_queries: false,
                ticker: BookTicker {
                    symbol: SYMBOL.to_string(),
                    bid_price: decimal("0.7000"),
                    bid_qty: decimal("10000"),
                    ask_price: decimal("0.7010"),
                    ask_qty: decimal("10000"),
                },
                filters: SymbolFilters {
                    tick_size: decimal("0.0001"),
                    step_size: decimal("0.1"),
                    min_notional: decimal("5"),
                },
                maker_rate: decimal("0.001"),
                taker_rate: decimal("0.002"),
                market_orders: Vec::new(),
                apply_market_to_balance: true,
            }),
        }
    }

    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        let mut inner = self.inner.lock().unwrap();
        inner.balances.insert(asset.to_string(), amount);
    }

    pub fn balance(&self, asset: &str) -> Decimal {
        let inner = self.inner.lock().unwrap();
        inner.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn set_fill_modes(&self, sell: FillMode, buy: FillMode) {
        let mut inner = self.inner.lock().unwrap();
        inner.sell_mode = sell;
        inner.buy_mode = buy;
    }

    pub fn fail_limit_submissions(&self, side: Side) {
        self.inner.lock().unwrap().fail_limit_side = Some(side);
    }

    pub fn fail_order_queries(&self) {
        self.inner.lock().unwrap().fail_order_queries = true;
    }

    pub fn set_filters(&self, filters: SymbolFilters) {
        self.inner.lock().unwrap().filters = filters;
    }

    pub fn market_orders(&self) -> Vec<(Side, Decimal)> {
        self.inner.lock().unwrap().market_orders.clone()
    }

    pub fn orders(&self) -> Vec<OrderState> {
        let inner = self.inner.lock().unwrap();
        let mut orders: Vec<_> = inner.orders.values().cloned().collect();
        orders.sort_by_key(|order| order.order_id);
        orders
    }
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpotExchange for MockExchange {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn book_ticker(&self, _symbol: &str) -> Result<BookTicker> {
        Ok(self.inner.lock().unwrap().ticker.clone())
    }

    async fn depth(&self, _symbol: &str, _limit: u32) -> Result<Depth> {
        let inner = self.inner.lock().unwrap();
        Ok(Depth {
            bids: vec![DepthLevel(inner.ticker.bid_price, inner.ticker.bid_qty)],
            asks: vec![DepthLevel(inner.ticker.ask_price, inner.ticker.ask_qty)],
        })
    }

    async fn symbol_filters(&self, _symbol: &str) -> Result<SymbolFilters> {
        Ok(self.inner.lock().unwrap().filters)
    }

    async fn commission_rate(&self, symbol: &str) -> Result<CommissionRate> {
        let inner = self.inner.lock().unwrap();
        Ok(CommissionRate {
            symbol: symbol.to_string(),
            maker_commission_rate: inner.maker_rate,
            taker_commission_rate: inner.taker_rate,
        })
    }

    async fn account(&self) -> Result<AccountInfo> {
        let inner = self.inner.lock().unwrap();
        Ok(AccountInfo {
            balances: inner
                .balances
                .iter()
                .map(|(asset, free)| AssetBalance {
                    asset: asset.clone(),
                    free: *free,
                    locked: Decimal::ZERO,
                })
                .collect(),
        })
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
        price: Decimal,
        _time_in_force: TimeInForce,
    ) -> Result<OrderAck> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_limit_side == Some(side) {
            return Err(AsterError::Authentication {
                message: "invalid api key".to_string(),
            });
        }

        let mode = match side {
            Side::Sell => inner.sell_mode,
            Side::Buy => inner.buy_mode,
        };
        let (status, executed) = match mode {
            FillMode::Full => (OrderStatus::Filled, qty),
            FillMode::Partial(executed) => (OrderStatus::PartiallyFilled, executed.min(qty)),
            FillMode::None => (OrderStatus::New, Decimal::ZERO),
            FillMode::Dead(executed) => (OrderStatus::Canceled, executed.min(qty)),
        };

        let order_id = inner.next_id;
        inner.next_id += 1;
        let state = OrderState {
            symbol: symbol.to_string(),
            order_id,
            side,
            order_type: OrderType::Limit,
            status,
            orig_qty: qty,
            executed_qty: executed,
            cummulative_quote_qty: executed * price,
            price: Some(price),
        };
        let ack = OrderAck {
            symbol: state.symbol.clone(),
            order_id,
            side,
            order_type: OrderType::Limit,
            status: OrderStatus::New,
            orig_qty: qty,
            executed_qty: Decimal::ZERO,
        };
        inner.orders.insert(order_id, state);
        Ok(ack)
    }

    async fn place_market_order(&self, symbol: &str, side: Side, qty: Decimal) -> Result<OrderAck> {
        let mut inner = self.inner.lock().unwrap();
        inner.market_orders.push((side, qty));

        if inner.apply_market_to_balance {
            let base = inner
                .balances
                .get(BASE)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let adjusted = match side {
                Side::Buy => base + qty,
                Side::Sell => base - qty,
            };
            inner.balances.insert(BASE.to_string(), adjusted);
        }

        let order_id = inner.next_id;
        inner.next_id += 1;
        Ok(OrderAck {
            symbol: symbol.to_string(),
            order_id,
            side,
            order_type: OrderType::Market,
            status: OrderStatus::Filled,
            orig_qty: qty,
            executed_qty: qty,
        })
    }

    async fn query_order(&self, _symbol: &str, order_id: i64) -> Result<OrderState> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_order_queries {
            return Err(AsterError::Api {
                code: -1000,
                message: "order status unavailable".to_string(),
            });
        }
        inner
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| AsterError::Api {
                code: -2013,
                message: "order does not exist".to_string(),
            })
    }

    async fn cancel_order(&self, _symbol: &str, order_id: i64) -> Result<OrderState> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AsterError::Api {
                code: -2013,
                message: "order does not exist".to_string(),
            })?;
        if !order.status.is_terminal() {
            order.status = OrderStatus::Canceled;
        }
        Ok(order.clone())
    }

    async fn open_orders(&self, _symbol: &str) -> Result<Vec<OrderState>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .values()
            .filter(|order| !order.status.is_terminal())
            .cloned()
            .collect())
    }
}
