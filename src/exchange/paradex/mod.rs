//! Paradex perpetuals venue integration.
//!
//! Provides authenticated REST access for:
//! - Interactive-session authentication
//! - Balance, positions and market metadata
//! - Order book top-of-book snapshots
//! - Order placement and cancellation

mod client;
mod types;

pub use client::ParadexClient;
pub use types::{MarketEntry, OrderBookResponse, OrderRequest, OrderResponse, PositionEntry};
