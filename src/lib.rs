//! # Spread Sniper
//!
//! An automated trading loop for a perpetuals venue that enters when the
//! bid/ask spread is tight and the book is deep, exits on a second spread
//! check or a timeout, and stays within per-account trade-rate ceilings by
//! rotating across accounts.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Venue client trait, Paradex REST client and paper venue
//! - `risk`: Sliding-window trade rate limiting
//! - `accounts`: Multi-account rotation and failover
//! - `strategy`: Market gate, position cycle and the orchestrating loop
//! - `persistence`: SQLite-based state persistence
//! - `utils`: Shared utilities and decimal arithmetic

pub mod accounts;
pub mod config;
pub mod exchange;
pub mod persistence;
pub mod risk;
pub mod strategy;
pub mod utils;

pub use config::Config;
