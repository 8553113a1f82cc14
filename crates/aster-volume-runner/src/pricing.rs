/*
[INPUT]:  Book ticker, symbol filters and a spread bias
[OUTPUT]: Aligned buy/sell prices and round quantity
[POS]:    Pricing layer - trade price derivation for paired orders
[UPDATE]: When changing price placement rules
*/

use aster_spot_adapter::{BookTicker, SymbolFilters};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Prices for one paired round.
///
/// Equal buy and sell price means both orders cross at one level;
/// a narrow book forces them one tick outside the spread instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePair {
    pub buy: Decimal,
    pub sell: Decimal,
}

fn bias_floor() -> Decimal {
    Decimal::from_str("0.45").unwrap_or(Decimal::ZERO)
}

fn bias_ceiling() -> Decimal {
    Decimal::from_str("0.55").unwrap_or(Decimal::ONE)
}

/// Floor a value to a grid of `step`.
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return value;
    }
    (value / step).floor() * step
}

/// Ceil a value to a grid of `step`.
pub fn ceil_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return value;
    }
    (value / step).ceil() * step
}

/// Derive the round's prices from the book.
///
/// When the spread is at most one tick the shared level does not exist,
/// so the buy goes one tick under the bid and the sell one tick over the
/// ask. Otherwise both orders share one level inside the spread, placed
/// `bias` of the way from bid to ask (clamped to 45-55%).
pub fn derive_pair(ticker: &BookTicker, filters: &SymbolFilters, bias: Decimal) -> PricePair {
    let tick = filters.tick_size;
    let bid = ticker.bid_price;
    let ask = ticker.ask_price;
    let spread = ask - bid;

    if spread <= tick {
        return PricePair {
            buy: floor_to_step(bid - tick, tick),
            sell: ceil_to_step(ask + tick, tick),
        };
    }

    let bias = bias.clamp(bias_floor(), bias_ceiling());
    let mut shared = floor_to_step(bid + spread * bias, tick);
    // Keep the shared level strictly inside the spread.
    if shared <= bid {
        shared = bid + tick;
    }
    if shared >= ask {
        shared = ask - tick;
    }

    PricePair {
        buy: shared,
        sell: shared,
    }
}

/// Align a requested quantity to the lot grid, flooring.
pub fn align_qty(qty: Decimal, filters: &SymbolFilters) -> Decimal {
    floor_to_step(qty, filters.step_size)
}

/// Raise price (and as a last resort quantity) until the notional clears
/// the exchange minimum.
pub fn enforce_min_notional(
    price: Decimal,
    qty: Decimal,
    filters: &SymbolFilters,
) -> (Decimal, Decimal) {
    if qty.is_zero() || price * qty >= filters.min_notional {
        return (price, qty);
    }

    let raised_price = ceil_to_step(filters.min_notional / qty, filters.tick_size);
    if raised_price * qty >= filters.min_notional {
        return (raised_price, qty);
    }

    let raised_qty = ceil_to_step(filters.min_notional / raised_price, filters.step_size);
    (raised_price, raised_qty)
}

/// Bias for a given round, cycling through the 45-55% band.
///
/// Deterministic so repeated rounds walk the band instead of pinning one
/// level.
pub fn round_bias(round: u64) -> Decimal {
    // 0.45 + (round mod 11) / 100 covers 0.45..=0.55.
    let offset = Decimal::from(round % 11) / Decimal::from(100);
    bias_floor() + offset
}
