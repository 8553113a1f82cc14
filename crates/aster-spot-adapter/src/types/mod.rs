/*
[INPUT]:  Wire schema definitions
[OUTPUT]: Typed models for the spot API
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the exchange schema changes or new types are added
*/

pub mod enums;
pub mod models;

pub use enums::{OrderStatus, OrderType, Side, TimeInForce};
pub use models::{
    AccountInfo, AssetBalance, BookTicker, CommissionRate, Depth, DepthLevel, OrderAck,
    OrderState, SymbolFilters,
};
