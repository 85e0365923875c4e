//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Round down to tick size (price precision).
pub fn round_down_to_tick(value: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size <= Decimal::ZERO {
        return value;
    }
    (value / tick_size).floor() * tick_size
}

/// Round down to lot size (quantity precision).
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size <= Decimal::ZERO {
        return value;
    }
    (value / lot_size).floor() * lot_size
}

/// Midpoint of a bid/ask pair.
pub fn mid_price(bid: Decimal, ask: Decimal) -> Decimal {
    (bid + ask) / dec!(2)
}

/// Bid-ask spread as a percentage of mid price.
///
/// Returns `None` when the mid price is not positive.
pub fn spread_percent(bid: Decimal, ask: Decimal) -> Option<Decimal> {
    let mid = mid_price(bid, ask);
    if mid <= Decimal::ZERO {
        return None;
    }
    Some((ask - bid) / mid * dec!(100))
}

/// Convert a percentage (e.g. 90 = 90%) to a fraction.
pub fn percent_to_fraction(percent: Decimal) -> Decimal {
    percent / dec!(100)
}
