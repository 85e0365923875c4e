//! Per-account trade rate limiting across four sliding windows.

use crate::config::RateLimits;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Sliding window granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateWindow {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateWindow {
    /// Windows in evaluation order (largest first).
    pub const PRIORITY: [RateWindow; 4] = [
        RateWindow::Day,
        RateWindow::Hour,
        RateWindow::Minute,
        RateWindow::Second,
    ];

    pub fn length_ms(&self) -> i64 {
        match self {
            RateWindow::Second => SECOND_MS,
            RateWindow::Minute => MINUTE_MS,
            RateWindow::Hour => HOUR_MS,
            RateWindow::Day => DAY_MS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateWindow::Second => "second",
            RateWindow::Minute => "minute",
            RateWindow::Hour => "hour",
            RateWindow::Day => "day",
        }
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade history of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindowState {
    /// Local calendar day the history belongs to (`YYYY-MM-DD`)
    pub day: String,
    /// Trade timestamps in milliseconds, oldest first
    pub trades: Vec<i64>,
}

impl RateWindowState {
    /// Empty history for the day of `now`.
    pub fn new(now: &DateTime<Local>) -> Self {
        Self {
            day: day_key(now),
            trades: Vec::new(),
        }
    }

    pub fn is_current_day(&self, now: &DateTime<Local>) -> bool {
        self.day == day_key(now)
    }
}

/// Trade counts per window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateUsage {
    pub second: u32,
    pub minute: u32,
    pub hour: u32,
    pub day: u32,
}

impl RateUsage {
    pub fn get(&self, window: RateWindow) -> u32 {
        match window {
            RateWindow::Second => self.second,
            RateWindow::Minute => self.minute,
            RateWindow::Hour => self.hour,
            RateWindow::Day => self.day,
        }
    }
}

impl fmt::Display for RateUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "s={} m={} h={} d={}",
            self.second, self.minute, self.hour, self.day
        )
    }
}

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed(RateUsage),
    Blocked { window: RateWindow, usage: RateUsage },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed(_))
    }
}

/// Local calendar-day key (`YYYY-MM-DD`).
pub fn day_key(now: &DateTime<Local>) -> String {
    now.date_naive().format("%Y-%m-%d").to_string()
}

/// Applies the configured ceilings to an account's trade history.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self { limits }
    }

    pub fn limit_for(&self, window: RateWindow) -> u32 {
        match window {
            RateWindow::Second => self.limits.per_second,
            RateWindow::Minute => self.limits.per_minute,
            RateWindow::Hour => self.limits.per_hour,
            RateWindow::Day => self.limits.per_day,
        }
    }

    /// Check whether another trade is allowed at `now`.
    ///
    /// Resets the history on a calendar-day change and prunes entries older
    /// than 24 hours before counting.
    pub fn check(&self, state: &mut RateWindowState, now: &DateTime<Local>) -> RateDecision {
        self.reconcile(state, now);

        let usage = Self::usage(state, now);
        for window in RateWindow::PRIORITY {
            if usage.get(window) >= self.limit_for(window) {
                debug!(
                    window = %window,
                    count = usage.get(window),
                    limit = self.limit_for(window),
                    "[RATE] Window saturated"
                );
                return RateDecision::Blocked { window, usage };
            }
        }
        RateDecision::Allowed(usage)
    }

    /// Append a trade at `now`. Callers persist afterwards.
    pub fn record(&self, state: &mut RateWindowState, now: &DateTime<Local>) {
        self.reconcile(state, now);
        state.trades.push(now.timestamp_millis());
    }

    /// Trade counts per window at `now`, without mutating the history.
    pub fn usage(state: &RateWindowState, now: &DateTime<Local>) -> RateUsage {
        let now_ms = now.timestamp_millis();
        let count = |window: RateWindow| Self::count_since(state, now_ms - window.length_ms());
        RateUsage {
            second: count(RateWindow::Second),
            minute: count(RateWindow::Minute),
            hour: count(RateWindow::Hour),
            day: count(RateWindow::Day),
        }
    }

    /// Number of trades strictly newer than `since_ms`.
    pub fn count_since(state: &RateWindowState, since_ms: i64) -> u32 {
        state.trades.iter().filter(|&&t| t > since_ms).count() as u32
    }

    /// Trailing-hour saturation. Does not apply the day reset.
    pub fn is_hour_limited(&self, state: &RateWindowState, now: &DateTime<Local>) -> bool {
        let since = now.timestamp_millis() - RateWindow::Hour.length_ms();
        Self::count_since(state, since) >= self.limits.per_hour
    }

    /// Trades counted against today's ceiling; a stale day counts zero.
    pub fn day_count(&self, state: &RateWindowState, now: &DateTime<Local>) -> u32 {
        if !state.is_current_day(now) {
            return 0;
        }
        Self::count_since(state, now.timestamp_millis() - DAY_MS)
    }

    pub fn is_day_exhausted(&self, state: &RateWindowState, now: &DateTime<Local>) -> bool {
        self.day_count(state, now) >= self.limits.per_day
    }

    fn reconcile(&self, state: &mut RateWindowState, now: &DateTime<Local>) {
        let today = day_key(now);
        if state.day != today {
            if !state.day.is_empty() {
                info!(
                    previous = %state.day,
                    today = %today,
                    dropped = state.trades.len(),
                    "[RATE] New day, trade history reset"
                );
            }
            state.day = today;
            state.trades.clear();
        }

        let cutoff = now.timestamp_millis() - DAY_MS;
        state.trades.retain(|&t| t > cutoff);
    }
}
