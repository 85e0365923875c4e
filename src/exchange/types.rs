//! Venue-agnostic types shared by the trading core and the venue clients.

use crate::utils::decimal::{mid_price, spread_percent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Best bid/ask prices and sizes (top of book).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_size: Decimal,
    pub ask_size: Decimal,
}

impl MarketSnapshot {
    pub fn new(bid: Decimal, ask: Decimal, bid_size: Decimal, ask_size: Decimal) -> Self {
        Self {
            bid,
            ask,
            bid_size,
            ask_size,
        }
    }

    /// A snapshot is usable only when all four fields are positive.
    pub fn is_valid(&self) -> bool {
        self.bid > Decimal::ZERO
            && self.ask > Decimal::ZERO
            && self.bid_size > Decimal::ZERO
            && self.ask_size > Decimal::ZERO
    }

    pub fn mid(&self) -> Decimal {
        mid_price(self.bid, self.ask)
    }

    /// Spread as a percentage of mid (e.g. 0.004 = 0.004%).
    pub fn spread_percent(&self) -> Option<Decimal> {
        spread_percent(self.bid, self.ask)
    }

    /// Notional resting at the best bid.
    pub fn bid_notional(&self) -> Decimal {
        self.bid_size * self.bid
    }

    /// Notional resting at the best ask.
    pub fn ask_notional(&self) -> Decimal {
        self.ask_size * self.ask
    }
}

/// Price/quantity granularity of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentMetadata {
    pub tick_size: Decimal,
    pub size_increment: Decimal,
    pub min_notional: Decimal,
}

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that reduces a position on this side.
    pub fn closing_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

/// Venue-reported open position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub market: String,
    pub side: PositionSide,
    pub size: Decimal,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.size <= Decimal::ZERO
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time in force of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc, // Good Till Cancel
    Ioc, // Immediate or Cancel
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
        }
    }
}

/// New limit order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOrder {
    pub market: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
    pub time_in_force: TimeInForce,
}

/// New market order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOrder {
    pub market: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub reduce_only: bool,
}

/// Venue acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: String,
    pub client_id: String,
    pub market: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_validity() {
        assert!(MarketSnapshot::new(dec!(100), dec!(101), dec!(1), dec!(1)).is_valid());
        assert!(!MarketSnapshot::new(dec!(100), Decimal::ZERO, dec!(1), dec!(1)).is_valid());
        assert!(!MarketSnapshot::new(dec!(100), dec!(101), dec!(1), Decimal::ZERO).is_valid());
    }

    #[test]
    fn test_snapshot_notionals() {
        let snapshot = MarketSnapshot::new(dec!(100), dec!(102), dec!(3), dec!(2));
        assert_eq!(snapshot.mid(), dec!(101));
        assert_eq!(snapshot.bid_notional(), dec!(300));
        assert_eq!(snapshot.ask_notional(), dec!(204));
    }

    #[test]
    fn test_closing_side() {
        assert_eq!(PositionSide::Long.closing_side(), OrderSide::Sell);
        assert_eq!(PositionSide::Short.closing_side(), OrderSide::Buy);
    }
}
