//! Durable state for the sniper loop.
//!
//! Persists what must survive restarts:
//! - Cumulative cycle count and traded volume estimate
//! - The active account index
//! - Each account's calendar day and recent trade timestamps

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Most recent trade timestamps kept per account.
pub const MAX_PERSISTED_TRADES: usize = 1000;

/// Persisted rate-window state of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAccount {
    pub index: usize,
    pub name: String,
    pub day: String,
    pub trades: Vec<i64>,
}

/// Persisted loop state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedState {
    pub cycle_count: u64,
    pub total_volume: Decimal,
    pub active_index: usize,
    pub accounts: Vec<PersistedAccount>,
    pub last_saved: DateTime<Utc>,
}

/// Storage port for [`PersistedState`]. Every save is a full overwrite.
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send {
    fn load(&self) -> Result<Option<PersistedState>>;
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Keep only the newest [`MAX_PERSISTED_TRADES`] timestamps.
fn truncate_trades(trades: &[i64]) -> &[i64] {
    let start = trades.len().saturating_sub(MAX_PERSISTED_TRADES);
    &trades[start..]
}

/// SQLite-backed state store.
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Open (or create) the database and initialize the schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        let store = Self { conn };
        store.init_schema()?;

        info!("[PERSISTENCE] State store initialized at {:?}", path);
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Loop state (singleton row)
            CREATE TABLE IF NOT EXISTS sniper_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                cycle_count INTEGER NOT NULL,
                total_volume TEXT NOT NULL,
                active_index INTEGER NOT NULL,
                last_saved TEXT NOT NULL
            );

            -- Per-account trade windows
            CREATE TABLE IF NOT EXISTS account_windows (
                account_index INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                day TEXT NOT NULL,
                trades TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Remove all saved state.
    pub fn clear_all(&self) -> Result<()> {
        warn!("[PERSISTENCE] Clearing all saved state");
        self.conn.execute_batch(
            r#"
            DELETE FROM sniper_state;
            DELETE FROM account_windows;
            "#,
        )?;
        Ok(())
    }
}

impl StateStore for SqliteStateStore {
    fn save(&self, state: &PersistedState) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO sniper_state (id, cycle_count, total_volume, active_index, last_saved)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                cycle_count = ?1,
                total_volume = ?2,
                active_index = ?3,
                last_saved = ?4
            "#,
            params![
                state.cycle_count,
                state.total_volume.to_string(),
                state.active_index as i64,
                state.last_saved.to_rfc3339(),
            ],
        )?;

        tx.execute("DELETE FROM account_windows", [])?;

        for account in &state.accounts {
            let trades = serde_json::to_string(truncate_trades(&account.trades))
                .context("Failed to encode trade timestamps")?;
            tx.execute(
                r#"
                INSERT INTO account_windows (account_index, name, day, trades)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![account.index as i64, account.name, account.day, trades],
            )?;
        }

        tx.commit()?;

        debug!(
            cycles = state.cycle_count,
            volume = %state.total_volume,
            active = state.active_index,
            "[PERSISTENCE] State saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedState>> {
        let row: Option<(u64, String, i64, String)> = self
            .conn
            .query_row(
                r#"
                SELECT cycle_count, total_volume, active_index, last_saved
                FROM sniper_state WHERE id = 1
                "#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((cycle_count, total_volume, active_index, last_saved)) = row else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT account_index, name, day, trades
            FROM account_windows
            ORDER BY account_index
            "#,
        )?;

        let accounts: Vec<PersistedAccount> = stmt
            .query_map([], |row| {
                let index: i64 = row.get(0)?;
                let name: String = row.get(1)?;
                let day: String = row.get(2)?;
                let trades: String = row.get(3)?;
                Ok((index, name, day, trades))
            })?
            .filter_map(|r| r.ok())
            .map(|(index, name, day, trades)| {
                let trades = serde_json::from_str(&trades).unwrap_or_else(|e| {
                    warn!(%name, error = %e, "[PERSISTENCE] Discarding unreadable trade history");
                    Vec::new()
                });
                PersistedAccount {
                    index: index.max(0) as usize,
                    name,
                    day,
                    trades,
                }
            })
            .collect();

        let state = PersistedState {
            cycle_count,
            total_volume: Decimal::from_str(&total_volume).unwrap_or_default(),
            active_index: active_index.max(0) as usize,
            accounts,
            last_saved: DateTime::parse_from_rfc3339(&last_saved)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        };

        info!(
            cycles = state.cycle_count,
            volume = %state.total_volume,
            accounts = state.accounts.len(),
            last_saved = %state.last_saved,
            "[PERSISTENCE] Loaded state from database"
        );

        Ok(Some(state))
    }
}

/// In-memory state store for paper runs without a database.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        let guard = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("state lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        let mut saved = state.clone();
        for account in &mut saved.accounts {
            account.trades = truncate_trades(&account.trades).to_vec();
        }
        *self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("state lock poisoned"))? = Some(saved);
        Ok(())
    }
}
