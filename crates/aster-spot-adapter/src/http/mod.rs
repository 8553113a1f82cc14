/*
[INPUT]:  Submodule implementations (client, signing, endpoints)
[OUTPUT]: HTTP layer public surface
[POS]:    HTTP layer - module wiring
[UPDATE]: When adding new endpoint modules
*/

mod account;
mod client;
mod error;
mod public;
mod signature;
mod trade;

pub use client::{AsterClient, ClientConfig, Credentials};
pub use error::{AsterError, Result};
