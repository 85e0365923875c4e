//! One open → settle → close sequence on the active account.

use crate::config::{PositionSizing, TimingConfig, TradingConfig};
use crate::exchange::{
    InstrumentMetadata, LimitOrder, MarketOrder, OrderAck, OrderSide, TimeInForce, VenueClient,
    VenueError,
};
use crate::utils::decimal::{percent_to_fraction, round_down_to_lot, round_down_to_tick};
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Failure of either cycle phase.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("venue call failed: {0}")]
    Venue(#[from] VenueError),

    #[error("instrument metadata unavailable for {0}")]
    MetadataUnavailable(String),

    #[error("market data unavailable for {0}")]
    MarketDataUnavailable(String),

    #[error("balance too low: {balance:?} (minimum notional {min_notional})")]
    BalanceTooLow {
        balance: Option<Decimal>,
        min_notional: Decimal,
    },

    #[error("order notional {notional} below minimum {min_notional} (size {size})")]
    BelowMinNotional {
        size: Decimal,
        notional: Decimal,
        min_notional: Decimal,
    },
}

impl CycleError {
    /// Whether the failure came from the venue rather than from local checks.
    pub fn is_venue_failure(&self) -> bool {
        matches!(self, CycleError::Venue(_))
    }
}

/// Details of an accepted entry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReport {
    pub size: Decimal,
    pub price: Decimal,
    pub mid: Decimal,
    pub balance: Decimal,
    /// size × mid, used as the volume estimate
    pub notional: Decimal,
    pub order: OrderAck,
}

/// Why the close phase ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    SpreadSatisfied,
    TimeoutForced,
    /// No position was left to close
    AlreadyFlat,
}

impl fmt::Display for CloseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CloseTrigger::SpreadSatisfied => "spread satisfied",
            CloseTrigger::TimeoutForced => "timeout forced",
            CloseTrigger::AlreadyFlat => "already flat",
        };
        f.write_str(label)
    }
}

/// Details of a completed close phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    pub trigger: CloseTrigger,
    pub polls: u32,
    pub elapsed: Duration,
    pub last_spread: Option<Decimal>,
    pub order: Option<OrderAck>,
}

/// Runs the entry and exit phases against a venue client.
#[derive(Debug, Clone)]
pub struct PositionCycle {
    market: String,
    sizing: PositionSizing,
    close_spread_target: Decimal,
    close_timeout: Duration,
    poll_interval: Duration,
}

/// Order size for the given sizing mode, truncated to the size increment.
pub fn compute_order_size(
    sizing: PositionSizing,
    balance: Decimal,
    mid: Decimal,
    size_increment: Decimal,
) -> Decimal {
    let raw = match sizing {
        PositionSizing::Fixed(size) => size,
        PositionSizing::PercentOfBalance(percent) => {
            if mid <= Decimal::ZERO {
                return Decimal::ZERO;
            }
            balance * percent_to_fraction(percent) / mid
        }
    };
    round_down_to_lot(raw, size_increment)
}

impl PositionCycle {
    pub fn new(
        market: impl Into<String>,
        sizing: PositionSizing,
        close_spread_target: Decimal,
        close_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            market: market.into(),
            sizing,
            close_spread_target,
            close_timeout,
            poll_interval,
        }
    }

    pub fn from_config(trading: &TradingConfig, timing: &TimingConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            trading.market.clone(),
            trading.sizing()?,
            trading.close_spread_target,
            trading.close_timeout(),
            timing.poll_interval(),
        ))
    }

    /// Size and submit the GTC limit buy. Does not wait for a fill.
    pub async fn open(&self, client: &dyn VenueClient) -> Result<OpenReport, CycleError> {
        let market = self.market.as_str();

        let InstrumentMetadata {
            tick_size,
            size_increment,
            min_notional,
        } = client
            .get_instrument_metadata(market)
            .await?
            .ok_or_else(|| CycleError::MetadataUnavailable(market.to_string()))?;

        let snapshot = client
            .get_market_snapshot(market)
            .await?
            .filter(|s| s.bid > Decimal::ZERO && s.ask > Decimal::ZERO)
            .ok_or_else(|| CycleError::MarketDataUnavailable(market.to_string()))?;

        let balance = match client.get_balance().await? {
            Some(balance) if balance >= min_notional => balance,
            other => {
                return Err(CycleError::BalanceTooLow {
                    balance: other,
                    min_notional,
                })
            }
        };

        let mid = snapshot.mid();
        let size = compute_order_size(self.sizing, balance, mid, size_increment);
        let notional = size * mid;
        if notional < min_notional {
            return Err(CycleError::BelowMinNotional {
                size,
                notional,
                min_notional,
            });
        }

        let price = round_down_to_tick(mid, tick_size);
        let order = LimitOrder {
            market: market.to_string(),
            side: OrderSide::Buy,
            size,
            price,
            time_in_force: TimeInForce::Gtc,
        };
        let ack = client.submit_limit_order(&order).await?;

        info!(
            %market,
            order_id = %ack.order_id,
            %size,
            %price,
            %mid,
            %balance,
            "[OPEN] Limit buy accepted"
        );

        Ok(OpenReport {
            size,
            price,
            mid,
            balance,
            notional,
            order: ack,
        })
    }

    /// Wait for a tight spread or the deadline, then flatten with a
    /// reduce-only market order.
    pub async fn close(&self, client: &dyn VenueClient) -> Result<CloseReport, CycleError> {
        let market = self.market.as_str();
        let started = Instant::now();
        let mut polls = 0u32;

        let (trigger, last_spread) = loop {
            polls += 1;
            let spread = match client.get_spread_percent(market).await {
                Ok(spread) => spread,
                Err(e) => {
                    debug!(%market, error = %e, "[CLOSE] Spread reading failed");
                    None
                }
            };

            if matches!(spread, Some(s) if s <= self.close_spread_target) {
                break (CloseTrigger::SpreadSatisfied, spread);
            }
            if started.elapsed() > self.close_timeout {
                break (CloseTrigger::TimeoutForced, spread);
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        let position = client
            .get_open_position(market)
            .await?
            .filter(|p| !p.is_flat());

        let Some(position) = position else {
            info!(%market, polls, "[CLOSE] No position to close");
            return Ok(CloseReport {
                trigger: CloseTrigger::AlreadyFlat,
                polls,
                elapsed: started.elapsed(),
                last_spread,
                order: None,
            });
        };

        let order = MarketOrder {
            market: market.to_string(),
            side: position.side.closing_side(),
            size: position.size,
            reduce_only: true,
        };
        let ack = client.submit_market_order(&order).await.map_err(|e| {
            warn!(%market, error = %e, "[CLOSE] Reduce-only market order failed");
            e
        })?;

        let elapsed = started.elapsed();
        info!(
            %market,
            order_id = %ack.order_id,
            side = %order.side,
            size = %order.size,
            trigger = %trigger,
            polls,
            elapsed_ms = elapsed.as_millis() as u64,
            "[CLOSE] Position closed"
        );

        Ok(CloseReport {
            trigger,
            polls,
            elapsed,
            last_spread,
            order: Some(ack),
        })
    }
}
