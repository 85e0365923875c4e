//! Venue client trait consumed by the trading core.
//!
//! The core only needs a narrow capability surface from the venue:
//! - Session management (authenticate / renew)
//! - Balance, top-of-book and instrument metadata reads
//! - Limit and market order submission
//! - Cancel-all and flatten for shutdown cleanup

use super::error::VenueError;
use super::types::{
    InstrumentMetadata, LimitOrder, MarketOrder, MarketSnapshot, OrderAck, Position,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

/// Result alias for venue calls.
pub type VenueResult<T> = Result<T, VenueError>;

/// Trait implemented by every venue backend (REST, paper).
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Obtain (or renew) a session. Safe to call when already authenticated.
    async fn authenticate(&self) -> VenueResult<()>;

    /// Available collateral balance; `None` when the venue reports no entry.
    async fn get_balance(&self) -> VenueResult<Option<Decimal>>;

    /// Best bid/ask for a market; `None` when the book is empty.
    async fn get_market_snapshot(&self, market: &str) -> VenueResult<Option<MarketSnapshot>>;

    /// Tick size, size increment and minimum notional for a market.
    async fn get_instrument_metadata(
        &self,
        market: &str,
    ) -> VenueResult<Option<InstrumentMetadata>>;

    /// Current open position for a market, if any.
    async fn get_open_position(&self, market: &str) -> VenueResult<Option<Position>>;

    /// Submit a limit order.
    async fn submit_limit_order(&self, order: &LimitOrder) -> VenueResult<OrderAck>;

    /// Submit a market order.
    async fn submit_market_order(&self, order: &MarketOrder) -> VenueResult<OrderAck>;

    /// Cancel every open order for a market, returning how many were cancelled.
    async fn cancel_all_orders(&self, market: &str) -> VenueResult<usize>;

    /// Flatten the open position for a market with a reduce-only market order.
    ///
    /// Returns the number of positions closed (0 or 1).
    async fn close_all_positions(&self, market: &str) -> VenueResult<usize> {
        let Some(position) = self.get_open_position(market).await? else {
            return Ok(0);
        };
        if position.is_flat() {
            return Ok(0);
        }

        let order = MarketOrder {
            market: market.to_string(),
            side: position.side.closing_side(),
            size: position.size,
            reduce_only: true,
        };
        self.submit_market_order(&order).await?;

        info!(
            %market,
            side = ?position.side,
            size = %position.size,
            "Position flattened"
        );
        Ok(1)
    }

    /// Current spread percentage derived from a fresh snapshot.
    async fn get_spread_percent(&self, market: &str) -> VenueResult<Option<Decimal>> {
        Ok(self
            .get_market_snapshot(market)
            .await?
            .filter(|s| s.bid > Decimal::ZERO && s.ask > Decimal::ZERO)
            .and_then(|s| s.spread_percent()))
    }
}
