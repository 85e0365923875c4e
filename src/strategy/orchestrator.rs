//! Top-level trading loop.
//!
//! Each tick runs rate check → market gate → open → settle → close, handles
//! account failover, and persists state after every mutation.

use crate::accounts::{Account, AccountRotator, RotationDecision};
use crate::config::{Config, TimingConfig};
use crate::exchange::{VenueClient, VenueError};
use crate::persistence::{PersistedState, StateStore};
use crate::risk::{RateDecision, RateUsage, RateWindow};
use crate::strategy::market_gate::{GateDecision, MarketGate, RejectReason};
use crate::strategy::position_cycle::{CloseReport, CycleError, OpenReport, PositionCycle};
use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Why a tick ended without trading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    RateLimited(RateWindow),
    SpreadTooWide,
    InsufficientDepth,
    BalanceTooLow,
    ApiFailure(String),
    MarketDataUnavailable,
    AccountRotated(usize),
    AllHourLimited,
    AllDayLimited,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RateLimited(window) => write!(f, "rate limited ({})", window),
            SkipReason::SpreadTooWide => write!(f, "spread too wide"),
            SkipReason::InsufficientDepth => write!(f, "insufficient depth"),
            SkipReason::BalanceTooLow => write!(f, "balance too low"),
            SkipReason::ApiFailure(msg) => write!(f, "api failure: {}", msg),
            SkipReason::MarketDataUnavailable => write!(f, "market data unavailable"),
            SkipReason::AccountRotated(index) => write!(f, "rotated to account #{}", index),
            SkipReason::AllHourLimited => write!(f, "all accounts hour-limited"),
            SkipReason::AllDayLimited => write!(f, "all accounts day-limited"),
        }
    }
}

impl From<RejectReason> for SkipReason {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::InvalidSnapshot => SkipReason::MarketDataUnavailable,
            RejectReason::SpreadTooWide { .. } => SkipReason::SpreadTooWide,
            RejectReason::InsufficientDepth { .. } => SkipReason::InsufficientDepth,
        }
    }
}

impl From<&CycleError> for SkipReason {
    fn from(err: &CycleError) -> Self {
        match err {
            CycleError::Venue(e) => SkipReason::ApiFailure(e.to_string()),
            CycleError::MetadataUnavailable(_) | CycleError::MarketDataUnavailable(_) => {
                SkipReason::MarketDataUnavailable
            }
            CycleError::BalanceTooLow { .. } | CycleError::BelowMinNotional { .. } => {
                SkipReason::BalanceTooLow
            }
        }
    }
}

/// Shared handle to a venue client.
pub type SharedClient = Arc<dyn VenueClient>;

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    /// `close` is `None` when the close phase failed
    Traded {
        open: OpenReport,
        close: Option<CloseReport>,
    },
}

/// Cumulative loop statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Sum of open notionals, in USD
    pub total_volume: Decimal,
}

/// Sequences the components of one trading cycle and owns the loop.
pub struct CycleOrchestrator {
    timing: TimingConfig,
    market: String,
    rotator: AccountRotator,
    store: Box<dyn StateStore>,
    gate: MarketGate,
    cycle: PositionCycle,
    stats: CycleStats,
    ticks: u64,
    last_status_log: Option<Instant>,
}

/// Time until the next local midnight.
pub fn until_next_midnight(now: &DateTime<Local>) -> Duration {
    let next_midnight = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());

    match next_midnight {
        Some(midnight) => (midnight - *now).to_std().unwrap_or(Duration::ZERO),
        None => Duration::from_secs(24 * 3600),
    }
}

impl CycleOrchestrator {
    pub fn new(config: &Config, rotator: AccountRotator, store: Box<dyn StateStore>) -> Result<Self> {
        Ok(Self {
            timing: config.timing.clone(),
            market: config.trading.market.clone(),
            gate: MarketGate::from_config(&config.trading),
            cycle: PositionCycle::from_config(&config.trading, &config.timing)?,
            rotator,
            store,
            stats: CycleStats::default(),
            ticks: 0,
            last_status_log: None,
        })
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn rotator(&self) -> &AccountRotator {
        &self.rotator
    }

    /// Load saved stats and rate windows. Returns whether state was found.
    pub fn restore(&mut self) -> Result<bool> {
        let Some(saved) = self.store.load()? else {
            info!("📂 [PERSISTENCE] No previous state found, starting fresh");
            return Ok(false);
        };

        self.stats = CycleStats {
            cycle_count: saved.cycle_count,
            total_volume: saved.total_volume,
        };
        self.rotator.restore(saved.active_index, &saved.accounts);

        info!(
            cycles = saved.cycle_count,
            volume = %saved.total_volume,
            active = %self.rotator.current_account().name,
            "📂 [PERSISTENCE] Restored state"
        );
        Ok(true)
    }

    /// Authenticate the active account.
    pub async fn authenticate_current(&self) -> Result<(), VenueError> {
        let account = self.rotator.current_account();
        self.rotator.current_client().authenticate().await?;
        info!(account = %account.name, "🔑 Authenticated");
        Ok(())
    }

    /// Full-state overwrite. Failures are logged, never propagated.
    pub fn persist(&self) {
        let state = PersistedState {
            cycle_count: self.stats.cycle_count,
            total_volume: self.stats.total_volume,
            active_index: self.rotator.current_index(),
            accounts: self.rotator.to_persisted(),
            last_saved: Utc::now(),
        };
        if let Err(e) = self.store.save(&state) {
            error!(error = %e, "❌ [PERSISTENCE] Failed to save state");
        }
    }

    /// Run one iteration of the loop.
    pub async fn tick(&mut self) -> CycleOutcome {
        self.ticks += 1;
        let now = Local::now();

        if let RateDecision::Blocked { window, usage } = self.rotator.check_current(&now) {
            return self.handle_blocked(window, usage, &now).await;
        }

        let client = self.rotator.current_client();
        let snapshot = match client.get_market_snapshot(&self.market).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if e.is_transient() {
                    debug!(error = %e, "[GATE] Snapshot fetch failed");
                } else {
                    warn!(error = %e, "⚠️  [GATE] Snapshot fetch failed");
                }
                return CycleOutcome::Skipped(SkipReason::ApiFailure(e.to_string()));
            }
        };

        let spread_pct = match self.gate.evaluate(snapshot.as_ref()) {
            GateDecision::Enter { spread_pct } => spread_pct,
            GateDecision::Reject(reason) => {
                debug!(%reason, "[GATE] Entry rejected");
                return CycleOutcome::Skipped(reason.into());
            }
        };

        info!(
            account = %self.rotator.current_account().name,
            spread_pct = %spread_pct.round_dp(5),
            "🎯 [GATE] Conditions met, opening position"
        );

        let open = match self.cycle.open(client.as_ref()).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "⚠️  [OPEN] Open failed");
                return CycleOutcome::Skipped(SkipReason::from(&e));
            }
        };

        self.rotator.record_trade(&Local::now());
        self.persist();

        tokio::time::sleep(self.timing.settle_delay()).await;

        let close = match self.cycle.close(client.as_ref()).await {
            Ok(report) => {
                self.rotator.record_trade(&Local::now());
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "❌ [CLOSE] Close failed, position may remain open");
                None
            }
        };

        self.stats.cycle_count += 1;
        self.stats.total_volume += open.notional;
        self.persist();

        CycleOutcome::Traded { open, close }
    }

    async fn handle_blocked(
        &mut self,
        window: RateWindow,
        usage: RateUsage,
        now: &DateTime<Local>,
    ) -> CycleOutcome {
        match window {
            RateWindow::Day if self.rotator.all_exhausted(now) => {
                warn!(%usage, "🛑 [RATE] Daily limit reached on every account");
                CycleOutcome::Skipped(SkipReason::AllDayLimited)
            }
            RateWindow::Day | RateWindow::Hour if self.rotator.rotation_enabled() => {
                info!(
                    account = %self.rotator.current_account().name,
                    %window,
                    %usage,
                    "🔄 [ROTATE] Account saturated, switching"
                );
                self.switch_with_cleanup(now).await
            }
            _ => CycleOutcome::Skipped(SkipReason::RateLimited(window)),
        }
    }

    /// Clean up the active account, then fail over to the next usable one.
    pub async fn switch_with_cleanup(&mut self, now: &DateTime<Local>) -> CycleOutcome {
        let client = self.rotator.current_client();
        cleanup_account(&self.market, self.rotator.current_account(), client.as_ref()).await;
        self.persist();

        match self.rotator.rotate_next_available(now) {
            RotationDecision::Switched(index) => {
                self.persist();
                if let Err(e) = self.authenticate_current().await {
                    warn!(error = %e, "⚠️  [ROTATE] Authentication of new account failed");
                }
                CycleOutcome::Skipped(SkipReason::AccountRotated(index))
            }
            RotationDecision::AllHourLimited => {
                warn!(
                    backoff_secs = self.timing.hour_limit_backoff_secs,
                    "⏸️  [ROTATE] All accounts hour-limited"
                );
                CycleOutcome::Skipped(SkipReason::AllHourLimited)
            }
            RotationDecision::AllDayLimited => {
                warn!("🛑 [ROTATE] All accounts day-limited");
                CycleOutcome::Skipped(SkipReason::AllDayLimited)
            }
        }
    }

    /// Sleep to apply after a tick.
    pub fn delay_for(&self, outcome: &CycleOutcome, now: &DateTime<Local>) -> Duration {
        match outcome {
            CycleOutcome::Traded { .. } => self.timing.cycle_every(),
            CycleOutcome::Skipped(SkipReason::AllHourLimited) => self.timing.hour_limit_backoff(),
            CycleOutcome::Skipped(SkipReason::AllDayLimited) => {
                until_next_midnight(now) + self.timing.day_rollover_buffer()
            }
            CycleOutcome::Skipped(_) => self.timing.poll_interval(),
        }
    }

    fn report(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Traded { open, close } => {
                info!(
                    cycles = self.stats.cycle_count,
                    volume = %self.stats.total_volume.round_dp(2),
                    size = %open.size,
                    close = %close.as_ref().map(|c| c.trigger.to_string()).unwrap_or_else(|| "failed".to_string()),
                    "✅ [CYCLE] Cycle complete"
                );
            }
            CycleOutcome::Skipped(reason) => {
                let due = self
                    .last_status_log
                    .map_or(true, |t| t.elapsed() >= self.timing.status_log_interval());
                if due {
                    let usage = self
                        .rotator
                        .usage(self.rotator.current_index(), &Local::now());
                    info!(
                        tick = self.ticks,
                        account = %self.rotator.current_account().name,
                        %usage,
                        %reason,
                        "📡 [MONITOR] Waiting"
                    );
                    self.last_status_log = Some(Instant::now());
                }
            }
        }
    }

    /// Loop until the shutdown flag is raised, then clean up.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            market = %self.market,
            accounts = self.rotator.len(),
            "🚀 Starting main trading loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.tick().await;
            self.report(&outcome);
            let delay = self.delay_for(&outcome, &Local::now());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.shutdown_cleanup().await;
    }

    /// Cancel orders and flatten positions on every activated account, then
    /// save final state.
    pub async fn shutdown_cleanup(&mut self) {
        info!("🛑 [SHUTDOWN] Cleaning up accounts");
        for (index, account, client) in self.rotator.activated_clients() {
            debug!(index, "[SHUTDOWN] Cleaning up account");
            cleanup_account(&self.market, account, client.as_ref()).await;
        }

        info!("💾 [PERSISTENCE] Saving final state before shutdown...");
        self.persist();
        info!(
            cycles = self.stats.cycle_count,
            volume = %self.stats.total_volume.round_dp(2),
            "👋 [SHUTDOWN] Complete"
        );
    }
}

/// Cancel open orders and close the position. Errors are logged only.
async fn cleanup_account(market: &str, account: &Account, client: &dyn VenueClient) {
    match client.cancel_all_orders(market).await {
        Ok(cancelled) => debug!(account = %account.name, cancelled, "Orders cancelled"),
        Err(e) => warn!(account = %account.name, error = %e, "⚠️  Failed to cancel orders"),
    }
    match client.close_all_positions(market).await {
        Ok(closed) => debug!(account = %account.name, closed, "Positions closed"),
        Err(e) => warn!(account = %account.name, error = %e, "⚠️  Failed to close positions"),
    }
}
