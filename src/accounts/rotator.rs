//! Active-account selection and failover.

use crate::config::Credentials;
use crate::exchange::VenueClient;
use crate::persistence::PersistedAccount;
use crate::risk::{RateDecision, RateLimiter, RateUsage, RateWindowState};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A configured venue account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Display name used in logs and persisted state
    pub name: String,
    /// `None` for paper accounts
    pub credentials: Option<Credentials>,
}

impl Account {
    pub fn new(name: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            name: name.into(),
            credentials,
        }
    }

    /// Accounts for each credential pair, or a single paper account when none
    /// are configured.
    pub fn from_credentials(credentials: Vec<Credentials>) -> Vec<Account> {
        if credentials.is_empty() {
            return vec![Account::new("paper-1", None)];
        }
        credentials
            .into_iter()
            .enumerate()
            .map(|(i, creds)| {
                Account::new(
                    format!("account-{} ({})", i + 1, creds.short_address()),
                    Some(creds),
                )
            })
            .collect()
    }
}

/// Builds the venue client for an account.
pub trait ClientFactory {
    fn create(&self, index: usize, account: &Account) -> Result<Arc<dyn VenueClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(usize, &Account) -> Result<Arc<dyn VenueClient>>,
{
    fn create(&self, index: usize, account: &Account) -> Result<Arc<dyn VenueClient>> {
        self(index, account)
    }
}

/// Result of a failover attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    Switched(usize),
    /// Every account with daily budget left is hour-limited
    AllHourLimited,
    /// Every account has used its daily budget
    AllDayLimited,
}

struct AccountSlot {
    account: Account,
    client: Arc<dyn VenueClient>,
    window: RateWindowState,
    /// Client has been used and needs shutdown cleanup
    activated: bool,
}

/// Owns the accounts, their rate windows and the active index.
pub struct AccountRotator {
    slots: Vec<AccountSlot>,
    current: usize,
    limiter: RateLimiter,
}

impl AccountRotator {
    /// Create clients for every account up front. Account 0 starts active.
    pub fn new(
        accounts: Vec<Account>,
        factory: &dyn ClientFactory,
        limiter: RateLimiter,
        now: &DateTime<Local>,
    ) -> Result<Self> {
        anyhow::ensure!(!accounts.is_empty(), "at least one account is required");

        let slots = accounts
            .into_iter()
            .enumerate()
            .map(|(index, account)| {
                let client = factory
                    .create(index, &account)
                    .with_context(|| format!("Failed to create client for {}", account.name))?;
                Ok(AccountSlot {
                    account,
                    client,
                    window: RateWindowState::new(now),
                    activated: index == 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(accounts = slots.len(), "Account rotator initialized");

        Ok(Self {
            slots,
            current: 0,
            limiter,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Failover only applies with more than one account.
    pub fn rotation_enabled(&self) -> bool {
        self.slots.len() > 1
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_account(&self) -> &Account {
        &self.slots[self.current].account
    }

    pub fn current_client(&self) -> Arc<dyn VenueClient> {
        Arc::clone(&self.slots[self.current].client)
    }

    pub fn current_window(&self) -> &RateWindowState {
        &self.slots[self.current].window
    }

    /// Rate check for the active account.
    pub fn check_current(&mut self, now: &DateTime<Local>) -> RateDecision {
        let slot = &mut self.slots[self.current];
        self.limiter.check(&mut slot.window, now)
    }

    /// Record a trade on the active account.
    pub fn record_trade(&mut self, now: &DateTime<Local>) {
        let slot = &mut self.slots[self.current];
        self.limiter.record(&mut slot.window, now);
    }

    pub fn usage(&self, index: usize, now: &DateTime<Local>) -> RateUsage {
        self.slots
            .get(index)
            .map(|s| RateLimiter::usage(&s.window, now))
            .unwrap_or_default()
    }

    pub fn is_hour_limited(&self, index: usize, now: &DateTime<Local>) -> bool {
        self.slots
            .get(index)
            .is_some_and(|s| self.limiter.is_hour_limited(&s.window, now))
    }

    pub fn day_count(&self, index: usize, now: &DateTime<Local>) -> u32 {
        self.slots
            .get(index)
            .map(|s| self.limiter.day_count(&s.window, now))
            .unwrap_or(0)
    }

    fn is_day_exhausted(&self, index: usize, now: &DateTime<Local>) -> bool {
        self.slots
            .get(index)
            .is_some_and(|s| self.limiter.is_day_exhausted(&s.window, now))
    }

    /// Every account has used today's budget.
    pub fn all_exhausted(&self, now: &DateTime<Local>) -> bool {
        (0..self.slots.len()).all(|i| self.is_day_exhausted(i, now))
    }

    /// Move to the next account, in cyclic order after the current one, that
    /// has daily budget left and is not hour-limited.
    ///
    /// The active index only changes on [`RotationDecision::Switched`].
    pub fn rotate_next_available(&mut self, now: &DateTime<Local>) -> RotationDecision {
        let n = self.slots.len();
        let mut any_day_budget = false;

        for offset in 1..=n {
            let index = (self.current + offset) % n;
            if self.is_day_exhausted(index, now) {
                debug!(index, "[ROTATE] Skipping day-exhausted account");
                continue;
            }
            any_day_budget = true;
            if self.is_hour_limited(index, now) {
                debug!(index, "[ROTATE] Skipping hour-limited account");
                continue;
            }

            let from = self.current;
            self.current = index;
            self.slots[index].activated = true;
            info!(
                from = %self.slots[from].account.name,
                to = %self.slots[index].account.name,
                "[ROTATE] Switched account"
            );
            return RotationDecision::Switched(index);
        }

        if any_day_budget {
            RotationDecision::AllHourLimited
        } else {
            RotationDecision::AllDayLimited
        }
    }

    /// Accounts whose clients need shutdown cleanup.
    pub fn activated_clients(&self) -> Vec<(usize, &Account, Arc<dyn VenueClient>)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.activated)
            .map(|(i, s)| (i, &s.account, Arc::clone(&s.client)))
            .collect()
    }

    /// Snapshot of every account's rate window.
    pub fn to_persisted(&self) -> Vec<PersistedAccount> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, s)| PersistedAccount {
                index,
                name: s.account.name.clone(),
                day: s.window.day.clone(),
                trades: s.window.trades.clone(),
            })
            .collect()
    }

    /// Restore rate windows and the active index from saved state.
    ///
    /// Entries are matched by index; an index beyond the configured accounts is
    /// ignored and an out-of-range active index falls back to 0.
    pub fn restore(&mut self, active_index: usize, accounts: &[PersistedAccount]) {
        for saved in accounts {
            let Some(slot) = self.slots.get_mut(saved.index) else {
                warn!(
                    index = saved.index,
                    name = %saved.name,
                    "[PERSISTENCE] Saved account no longer configured"
                );
                continue;
            };
            slot.window = RateWindowState {
                day: saved.day.clone(),
                trades: saved.trades.clone(),
            };
        }

        if active_index < self.slots.len() {
            self.slots[self.current].activated = false;
            self.current = active_index;
            self.slots[active_index].activated = true;
        } else {
            warn!(active_index, "[PERSISTENCE] Saved active index out of range");
        }
    }
}
