//! Entry gating on spread and top-of-book depth.

use crate::config::TradingConfig;
use crate::exchange::MarketSnapshot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

/// Slack applied to the spread threshold to absorb rounding.
const SPREAD_EPSILON: Decimal = dec!(0.00001);

/// Why a snapshot did not qualify for entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No snapshot, or one with a non-positive field
    InvalidSnapshot,
    SpreadTooWide { spread_pct: Decimal },
    InsufficientDepth {
        bid_notional: Decimal,
        ask_notional: Decimal,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidSnapshot => write!(f, "market data unavailable"),
            RejectReason::SpreadTooWide { spread_pct } => {
                write!(f, "spread too wide ({:.5}%)", spread_pct)
            }
            RejectReason::InsufficientDepth {
                bid_notional,
                ask_notional,
            } => write!(
                f,
                "insufficient depth (bid ${:.0}, ask ${:.0})",
                bid_notional, ask_notional
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Enter { spread_pct: Decimal },
    Reject(RejectReason),
}

/// Evaluates snapshots against the configured entry thresholds.
#[derive(Debug, Clone)]
pub struct MarketGate {
    spread_threshold_percent: Decimal,
    min_book_notional: Decimal,
}

impl MarketGate {
    pub fn new(spread_threshold_percent: Decimal, min_book_notional: Decimal) -> Self {
        Self {
            spread_threshold_percent,
            min_book_notional,
        }
    }

    pub fn from_config(config: &TradingConfig) -> Self {
        Self::new(
            config.spread_threshold_percent,
            config.min_order_book_size_usd,
        )
    }

    pub fn evaluate(&self, snapshot: Option<&MarketSnapshot>) -> GateDecision {
        let Some(snapshot) = snapshot.filter(|s| s.is_valid()) else {
            return GateDecision::Reject(RejectReason::InvalidSnapshot);
        };
        let Some(spread_pct) = snapshot.spread_percent() else {
            return GateDecision::Reject(RejectReason::InvalidSnapshot);
        };

        if spread_pct > self.spread_threshold_percent + SPREAD_EPSILON {
            return GateDecision::Reject(RejectReason::SpreadTooWide { spread_pct });
        }

        let bid_notional = snapshot.bid_notional();
        let ask_notional = snapshot.ask_notional();
        if bid_notional < self.min_book_notional || ask_notional < self.min_book_notional {
            return GateDecision::Reject(RejectReason::InsufficientDepth {
                bid_notional,
                ask_notional,
            });
        }

        GateDecision::Enter { spread_pct }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> MarketGate {
        MarketGate::new(dec!(0.004), dec!(600))
    }

    #[test]
    fn test_tight_deep_book_enters() {
        let snapshot = MarketSnapshot::new(dec!(100.00), dec!(100.004), dec!(10), dec!(10));
        match gate().evaluate(Some(&snapshot)) {
            GateDecision::Enter { spread_pct } => {
                assert!(spread_pct < dec!(0.0041));
                assert!(spread_pct > dec!(0.0039));
            }
            other => panic!("expected entry, got {:?}", other),
        }
    }

    #[test]
    fn test_wide_spread_rejected() {
        let snapshot = MarketSnapshot::new(dec!(100.00), dec!(100.01), dec!(10), dec!(10));
        assert!(matches!(
            gate().evaluate(Some(&snapshot)),
            GateDecision::Reject(RejectReason::SpreadTooWide { .. })
        ));
    }

    #[test]
    fn test_thin_book_rejected() {
        // $500 resting on the bid
        let snapshot = MarketSnapshot::new(dec!(100.00), dec!(100.004), dec!(5), dec!(10));
        assert!(matches!(
            gate().evaluate(Some(&snapshot)),
            GateDecision::Reject(RejectReason::InsufficientDepth { .. })
        ));
    }

    #[test]
    fn test_missing_or_invalid_snapshot_rejected() {
        assert_eq!(
            gate().evaluate(None),
            GateDecision::Reject(RejectReason::InvalidSnapshot)
        );
        let empty_ask = MarketSnapshot::new(dec!(100), dec!(101), dec!(10), Decimal::ZERO);
        assert_eq!(
            gate().evaluate(Some(&empty_ask)),
            GateDecision::Reject(RejectReason::InvalidSnapshot)
        );
    }
}
