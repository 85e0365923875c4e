//! Configuration management for the spread sniper.
//!
//! Loads settings from `.env`, an optional config file and environment
//! variables (prefix `SNIPER`, separator `__`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Entry/exit thresholds, sizing and rate ceilings
    #[serde(default)]
    pub trading: TradingConfig,
    /// Loop cadence and backoff durations
    #[serde(default)]
    pub timing: TimingConfig,
    /// Venue endpoint and account credentials
    #[serde(default)]
    pub venue: VenueConfig,
    /// State persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Instrument identifier (e.g. "BTC-USD-PERP")
    #[serde(default = "default_market")]
    pub market: String,
    /// Maximum spread (in %, 0.004 = 0.004%) that permits entry
    #[serde(default = "default_spread_threshold_percent")]
    pub spread_threshold_percent: Decimal,
    /// Spread (in %) at or below which the position is closed early
    #[serde(default = "default_close_spread_target")]
    pub close_spread_target: Decimal,
    /// Hard deadline for the close phase, in milliseconds
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
    /// Minimum top-of-book notional on both sides, in USD
    #[serde(default = "default_min_order_book_size_usd")]
    pub min_order_book_size_usd: Decimal,
    /// Percentage of balance sized into a position (90 = 90%)
    #[serde(default = "default_open_size_percent")]
    pub open_size_percent: Decimal,
    /// Fixed order size; overrides percent sizing when non-empty
    #[serde(default)]
    pub fixed_size: String,
    #[serde(default = "default_limits_per_second")]
    pub limits_per_second: u32,
    #[serde(default = "default_limits_per_minute")]
    pub limits_per_minute: u32,
    #[serde(default = "default_limits_per_hour")]
    pub limits_per_hour: u32,
    #[serde(default = "default_limits_per_day")]
    pub limits_per_day: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Poll interval while waiting for conditions (also the close-phase poll)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause between the open order and the close phase
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Sleep after a completed cycle
    #[serde(default = "default_cycle_every_ms")]
    pub cycle_every_ms: u64,
    /// Backoff when every usable account is hour-limited
    #[serde(default = "default_hour_limit_backoff_secs")]
    pub hour_limit_backoff_secs: u64,
    /// Minimum gap between status summaries while waiting
    #[serde(default = "default_status_log_interval_secs")]
    pub status_log_interval_secs: u64,
    /// Extra wait past local midnight before retrying after day exhaustion
    #[serde(default = "default_day_rollover_buffer_secs")]
    pub day_rollover_buffer_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// "prod" or "testnet"
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Override for the REST base URL (empty = derived from environment)
    #[serde(default)]
    pub base_url: String,
    /// Single-account address
    #[serde(default)]
    pub address: String,
    /// Single-account signing key
    #[serde(default)]
    pub private_key: String,
    /// Multi-account list: `address:key;address:key`
    #[serde(default)]
    pub accounts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite state database
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

/// Credential pair for one venue account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub address: String,
    pub private_key: String,
}

impl Credentials {
    /// Abbreviated address safe for logs.
    pub fn short_address(&self) -> String {
        let chars: Vec<char> = self.address.chars().collect();
        if chars.len() <= 12 {
            return self.address.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.short_address())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// How the open order is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSizing {
    /// Fixed quantity in instrument units
    Fixed(Decimal),
    /// Percentage of available balance (90 = 90%)
    PercentOfBalance(Decimal),
}

/// Trade-count ceilings per sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub per_second: u32,
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_second: default_limits_per_second(),
            per_minute: default_limits_per_minute(),
            per_hour: default_limits_per_hour(),
            per_day: default_limits_per_day(),
        }
    }
}

// Default value functions
fn default_market() -> String {
    "BTC-USD-PERP".to_string()
}

fn default_spread_threshold_percent() -> Decimal {
    Decimal::new(4, 3) // 0.004%
}

fn default_close_spread_target() -> Decimal {
    Decimal::new(5, 3) // 0.005%
}

fn default_close_timeout_ms() -> u64 {
    3000
}

fn default_min_order_book_size_usd() -> Decimal {
    Decimal::new(600, 0) // $600 on each side
}

fn default_open_size_percent() -> Decimal {
    Decimal::new(90, 0) // 90% of balance
}

fn default_limits_per_second() -> u32 {
    3
}

fn default_limits_per_minute() -> u32 {
    30
}

fn default_limits_per_hour() -> u32 {
    300
}

fn default_limits_per_day() -> u32 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_cycle_every_ms() -> u64 {
    10_000
}

fn default_hour_limit_backoff_secs() -> u64 {
    600
}

fn default_status_log_interval_secs() -> u64 {
    10
}

fn default_day_rollover_buffer_secs() -> u64 {
    60
}

fn default_environment() -> String {
    "prod".to_string()
}

fn default_db_path() -> String {
    "data/sniper_state.db".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("SNIPER"))
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_legacy_env();
        Ok(config)
    }

    /// Honour the flat variable names used by older deployments.
    fn apply_legacy_env(&mut self) {
        let legacy = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if self.venue.address.is_empty() {
            if let Some(address) = legacy("PARADEX_L2_ADDRESS") {
                self.venue.address = address;
            }
        }
        if self.venue.private_key.is_empty() {
            if let Some(key) = legacy("PARADEX_L2_PRIVATE_KEY") {
                self.venue.private_key = key;
            }
        }
        if self.venue.accounts.is_empty() {
            if let Some(accounts) = legacy("PARADEX_ACCOUNTS") {
                self.venue.accounts = accounts;
            }
        }
        if let Some(environment) = legacy("PARADEX_ENVIRONMENT") {
            self.venue.environment = environment;
        }
        if let Some(market) = legacy("MARKET") {
            self.trading.market = market;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let t = &self.trading;

        anyhow::ensure!(!t.market.trim().is_empty(), "market must not be empty");
        anyhow::ensure!(
            t.spread_threshold_percent > Decimal::ZERO,
            "spread_threshold_percent must be positive"
        );
        anyhow::ensure!(
            t.close_spread_target > Decimal::ZERO,
            "close_spread_target must be positive"
        );
        anyhow::ensure!(
            t.min_order_book_size_usd >= Decimal::ZERO,
            "min_order_book_size_usd must not be negative"
        );
        anyhow::ensure!(
            t.open_size_percent > Decimal::ZERO && t.open_size_percent <= Decimal::ONE_HUNDRED,
            "open_size_percent must be between 0 and 100"
        );
        t.sizing()?;

        anyhow::ensure!(
            t.limits_per_second > 0
                && t.limits_per_minute > 0
                && t.limits_per_hour > 0
                && t.limits_per_day > 0,
            "rate limits must be non-zero"
        );
        anyhow::ensure!(
            t.limits_per_second <= t.limits_per_minute
                && t.limits_per_minute <= t.limits_per_hour
                && t.limits_per_hour <= t.limits_per_day,
            "rate limits must be ordered second <= minute <= hour <= day"
        );

        anyhow::ensure!(
            self.timing.poll_interval_ms > 0,
            "poll_interval_ms must be positive"
        );

        // Surface malformed account lists at startup even in paper mode
        self.venue.credentials()?;

        Ok(())
    }

    /// Validate for live trading, which additionally needs credentials.
    pub fn validate_live(&self) -> Result<()> {
        self.validate()?;
        anyhow::ensure!(
            !self.venue.credentials()?.is_empty(),
            "live trading requires venue credentials (address/private_key or accounts)"
        );
        Ok(())
    }
}

impl TradingConfig {
    /// Resolve the sizing mode; a non-empty `fixed_size` wins.
    pub fn sizing(&self) -> Result<PositionSizing> {
        let fixed = self.fixed_size.trim();
        if fixed.is_empty() {
            return Ok(PositionSizing::PercentOfBalance(self.open_size_percent));
        }

        let size = Decimal::from_str(fixed)
            .with_context(|| format!("fixed_size is not a number: {:?}", fixed))?;
        anyhow::ensure!(size > Decimal::ZERO, "fixed_size must be positive");
        Ok(PositionSizing::Fixed(size))
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            per_second: self.limits_per_second,
            per_minute: self.limits_per_minute,
            per_hour: self.limits_per_hour,
            per_day: self.limits_per_day,
        }
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn cycle_every(&self) -> Duration {
        Duration::from_millis(self.cycle_every_ms)
    }

    pub fn hour_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.hour_limit_backoff_secs)
    }

    pub fn status_log_interval(&self) -> Duration {
        Duration::from_secs(self.status_log_interval_secs)
    }

    pub fn day_rollover_buffer(&self) -> Duration {
        Duration::from_secs(self.day_rollover_buffer_secs)
    }
}

impl VenueConfig {
    /// REST base URL: explicit override or the environment default.
    pub fn base_url(&self) -> String {
        if !self.base_url.trim().is_empty() {
            return self.base_url.trim().to_string();
        }
        crate::exchange::ParadexClient::default_base_url(&self.environment).to_string()
    }

    /// Configured credential pairs.
    ///
    /// The multi-account list takes precedence over the single pair. Pairs are
    /// separated by `;`, `,` or newlines; address and key by the first `:`.
    pub fn credentials(&self) -> Result<Vec<Credentials>> {
        if !self.accounts.trim().is_empty() {
            return self
                .accounts
                .split(|c: char| c == ';' || c == ',' || c == '\n')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .enumerate()
                .map(|(i, entry)| {
                    let (address, key) = entry.split_once(':').with_context(|| {
                        format!("account entry #{} is not in address:key form", i + 1)
                    })?;
                    let (address, key) = (address.trim(), key.trim());
                    anyhow::ensure!(
                        !address.is_empty() && !key.is_empty(),
                        "account entry #{} has an empty address or key",
                        i + 1
                    );
                    Ok(Credentials {
                        address: address.to_string(),
                        private_key: key.to_string(),
                    })
                })
                .collect();
        }

        match (self.address.trim(), self.private_key.trim()) {
            ("", "") => Ok(Vec::new()),
            (address, key) if !address.is_empty() && !key.is_empty() => Ok(vec![Credentials {
                address: address.to_string(),
                private_key: key.to_string(),
            }]),
            _ => anyhow::bail!("both venue address and private_key must be set"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            timing: TimingConfig::default(),
            venue: VenueConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            market: default_market(),
            spread_threshold_percent: default_spread_threshold_percent(),
            close_spread_target: default_close_spread_target(),
            close_timeout_ms: default_close_timeout_ms(),
            min_order_book_size_usd: default_min_order_book_size_usd(),
            open_size_percent: default_open_size_percent(),
            fixed_size: String::new(),
            limits_per_second: default_limits_per_second(),
            limits_per_minute: default_limits_per_minute(),
            limits_per_hour: default_limits_per_hour(),
            limits_per_day: default_limits_per_day(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            cycle_every_ms: default_cycle_every_ms(),
            hour_limit_backoff_secs: default_hour_limit_backoff_secs(),
            status_log_interval_secs: default_status_log_interval_secs(),
            day_rollover_buffer_secs: default_day_rollover_buffer_secs(),
        }
    }
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            base_url: String::new(),
            address: String::new(),
            private_key: String::new(),
            accounts: String::new(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}
