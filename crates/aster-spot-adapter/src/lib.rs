/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public AsterDEX spot adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod exchange;
pub mod http;
pub mod types;

// Re-export the capability surface
pub use exchange::SpotExchange;

// Re-export commonly used types from http
pub use http::{AsterClient, AsterError, ClientConfig, Credentials, Result};

// Re-export all wire types
pub use types::*;
