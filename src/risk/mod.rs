//! Trade rate ceilings.
//!
//! Tracks per-account trade timestamps and enforces the per-second,
//! per-minute, per-hour and per-day limits.

mod rate_limiter;

pub use rate_limiter::{
    day_key, RateDecision, RateLimiter, RateUsage, RateWindow, RateWindowState,
};
