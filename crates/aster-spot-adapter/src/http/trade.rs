/*
[INPUT]:  Order parameters (symbol, side, quantity, price)
[OUTPUT]: Order acknowledgements and order state snapshots
[POS]:    HTTP layer - trading endpoints (require signature)
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use reqwest::Method;
use rust_decimal::Decimal;

use crate::http::{AsterClient, Result};
use crate::types::{OrderAck, OrderState, Side, TimeInForce};

impl AsterClient {
    /// Place a limit order
    ///
    /// POST /api/v1/order (signed)
    pub async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderAck> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", time_in_force.as_str().to_string()),
            ("quantity", qty.normalize().to_string()),
            ("price", price.normalize().to_string()),
        ];
        let builder = self.signed_request(Method::POST, "/api/v1/order", &params)?;
        self.send_json(builder).await
    }

    /// Place a market order for a base quantity
    ///
    /// POST /api/v1/order (signed)
    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<OrderAck> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", qty.normalize().to_string()),
        ];
        let builder = self.signed_request(Method::POST, "/api/v1/order", &params)?;
        self.send_json(builder).await
    }

    /// Query a single order by id
    ///
    /// GET /api/v1/order?symbol={symbol}&orderId={order_id} (signed)
    pub async fn query_order(&self, symbol: &str, order_id: i64) -> Result<OrderState> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let builder = self.signed_request(Method::GET, "/api/v1/order", &params)?;
        self.send_json(builder).await
    }

    /// Cancel a single order by id
    ///
    /// DELETE /api/v1/order?symbol={symbol}&orderId={order_id} (signed)
    pub async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<OrderState> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let builder = self.signed_request(Method::DELETE, "/api/v1/order", &params)?;
        self.send_json(builder).await
    }

    /// All open orders for a symbol
    ///
    /// GET /api/v1/openOrders?symbol={symbol} (signed)
    pub async fn open_orders(&self, symbol: &str) -> Result<Vec<OrderState>> {
        let params = [("symbol", symbol.to_string())];
        let builder = self.signed_request(Method::GET, "/api/v1/openOrders", &params)?;
        self.send_json(builder).await
    }
}
