/*
[INPUT]:  Signed account queries
[OUTPUT]: Balances and commission rates
[POS]:    HTTP layer - account endpoints (require signature)
[UPDATE]: When adding new account endpoints
*/

use reqwest::Method;

use crate::http::{AsterClient, Result};
use crate::types::{AccountInfo, CommissionRate};

impl AsterClient {
    /// Account snapshot including per-asset balances
    ///
    /// GET /api/v1/account (signed)
    pub async fn account(&self) -> Result<AccountInfo> {
        let builder = self.signed_request(Method::GET, "/api/v1/account", &[])?;
        self.send_json(builder).await
    }

    /// Maker/taker commission rates for a symbol
    ///
    /// GET /api/v1/commissionRate?symbol={symbol} (signed)
    pub async fn commission_rate(&self, symbol: &str) -> Result<CommissionRate> {
        let params = [("symbol", symbol.to_string())];
        let builder = self.signed_request(Method::GET, "/api/v1/commissionRate", &params)?;
        self.send_json(builder).await
    }
}
