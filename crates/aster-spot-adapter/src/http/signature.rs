/*
[INPUT]:  Canonical query strings and the API secret
[OUTPUT]: Hex-encoded HMAC-SHA256 request signatures
[POS]:    HTTP layer - request signing
[UPDATE]: When the exchange changes its signing scheme
*/

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign a canonical query string with the account secret.
///
/// The exchange expects lowercase hex of HMAC-SHA256 over the exact
/// query string sent on the wire, appended as `signature=`.
pub fn sign(query: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
