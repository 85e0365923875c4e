//! Spread Sniper - Main Entry Point
//!
//! Paper trading by default; set `LIVE_TRADING=true` to trade for real.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use spread_sniper::accounts::{Account, AccountRotator};
use spread_sniper::config::{Config, VenueConfig};
use spread_sniper::exchange::{PaperVenueClient, ParadexClient};
use spread_sniper::persistence::{SqliteStateStore, StateStore};
use spread_sniper::risk::{RateLimiter, RateUsage};
use spread_sniper::strategy::{CycleOrchestrator, SharedClient};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Spread Sniper CLI
#[derive(Parser)]
#[command(name = "spread-sniper")]
#[command(version, about = "Tight-spread open/close cycling on Paradex perpetuals")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cycle statistics and rate usage from persisted state
    Status {
        /// Path to SQLite database (default: data/sniper_state.db)
        #[arg(short, long, default_value = "data/sniper_state.db")]
        db: String,

        /// Show per-account trade history details
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Trading mode: Live (real money) or Paper (simulated fills).
#[derive(Debug, Clone, Copy, PartialEq)]
enum TradingMode {
    Live,
    Paper,
}

/// Starting balance of each paper account.
const PAPER_BALANCE: rust_decimal::Decimal = dec!(1000);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    if let Some(Commands::Status { db, verbose }) = cli.command {
        return show_status(&db, verbose);
    }

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║              Spread Sniper v{}                          ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let trading_mode = if std::env::var("LIVE_TRADING").unwrap_or_default() == "true" {
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
        TradingMode::Live
    } else {
        info!("📝 PAPER TRADING MODE - Simulated fills against live market data");
        TradingMode::Paper
    };

    let config = Config::load()?;
    match trading_mode {
        TradingMode::Live => config.validate_live()?,
        TradingMode::Paper => config.validate()?,
    }
    log_config(&config);

    let credentials = config.venue.credentials()?;
    let accounts = match trading_mode {
        TradingMode::Live => Account::from_credentials(credentials),
        // Paper accounts mirror the configured ones, or a single default
        TradingMode::Paper => (0..credentials.len().max(1))
            .map(|i| Account::new(format!("paper-{}", i + 1), None))
            .collect(),
    };

    let factory = client_factory(trading_mode, &config.venue)?;

    let rotator = AccountRotator::new(
        accounts,
        &factory,
        RateLimiter::new(config.trading.rate_limits()),
        &Local::now(),
    )?;

    let store = SqliteStateStore::new(&config.persistence.db_path)
        .context("Failed to initialize persistence database")?;

    let mut orchestrator = CycleOrchestrator::new(&config, rotator, Box::new(store))?;
    orchestrator.restore()?;

    if let Err(e) = orchestrator.authenticate_current().await {
        error!("❌ Initial authentication failed: {}", e);
        return Err(e.into());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    orchestrator.run(shutdown_rx).await;

    info!("👋 Spread Sniper shutdown complete");
    Ok(())
}

/// Per-account client constructor for the trading mode.
///
/// Paper clients share one public client for live top of book; live mode
/// builds only authenticated clients.
fn client_factory(
    trading_mode: TradingMode,
    venue: &VenueConfig,
) -> Result<impl Fn(usize, &Account) -> Result<SharedClient>> {
    let feed: Option<SharedClient> = match trading_mode {
        TradingMode::Paper => Some(Arc::new(
            ParadexClient::public(venue).context("Failed to create market data client")?,
        )),
        TradingMode::Live => None,
    };
    let venue = venue.clone();

    Ok(move |_: usize, account: &Account| -> Result<SharedClient> {
        match (&feed, &account.credentials) {
            (Some(feed), _) => Ok(Arc::new(PaperVenueClient::with_feed(
                PAPER_BALANCE,
                Arc::clone(feed),
            ))),
            (None, Some(creds)) => Ok(Arc::new(ParadexClient::new(&venue, creds.clone())?)),
            (None, None) => anyhow::bail!("Account {} has no credentials", account.name),
        }
    })
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "spread-sniper.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("spread_sniper=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    let t = &config.trading;
    info!("📋 Configuration:");
    info!("   Market: {}", t.market);
    info!("   Entry Spread: <= {}%", t.spread_threshold_percent);
    info!("   Min Book Depth: ${} per side", t.min_order_book_size_usd);
    info!(
        "   Close: spread <= {}% or after {}ms",
        t.close_spread_target, t.close_timeout_ms
    );
    match t.sizing() {
        Ok(sizing) => info!("   Sizing: {:?}", sizing),
        Err(e) => warn!("   Sizing: invalid ({})", e),
    }
    info!(
        "   Rate Limits: {}/s, {}/min, {}/h, {}/day",
        t.limits_per_second, t.limits_per_minute, t.limits_per_hour, t.limits_per_day
    );
    info!("   Cycle Interval: {}ms", config.timing.cycle_every_ms);
    info!("   Environment: {}", config.venue.environment);
}

/// Show persisted cycle statistics and per-account rate usage.
fn show_status(db_path: &str, verbose: bool) -> Result<()> {
    use std::path::Path;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              SPREAD SNIPER STATUS                          ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\n❌ Database not found: {}", db_path);
        println!("   The sniper has not been started yet, or the database path is incorrect.");
        return Ok(());
    }

    let store = SqliteStateStore::new(db_path)?;

    let Some(state) = store.load()? else {
        println!("\n❌ No saved state found in database.");
        println!("   The sniper may not have run yet.");
        return Ok(());
    };

    let now = Local::now();

    println!("\n📊 Summary");
    println!("   ├─ Cycles:           {}", state.cycle_count);
    println!("   ├─ Volume Estimate:  ${:.2}", state.total_volume);
    println!("   ├─ Active Account:   #{}", state.active_index);
    println!(
        "   └─ Last Updated:     {}",
        state.last_saved.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!("\n🔑 Accounts");
    for account in &state.accounts {
        let window = spread_sniper::risk::RateWindowState {
            day: account.day.clone(),
            trades: account.trades.clone(),
        };
        let usage = if window.is_current_day(&now) {
            RateLimiter::usage(&window, &now)
        } else {
            RateUsage::default()
        };
        let marker = if account.index == state.active_index {
            "▶"
        } else {
            " "
        };
        println!(
            "   {} #{} {:<28} day={} {}",
            marker, account.index, account.name, account.day, usage
        );

        if verbose {
            if let Some(last) = account
                .trades
                .last()
                .and_then(|ms| Local.timestamp_millis_opt(*ms).single())
            {
                println!(
                    "       Last trade: {} ({} stored)",
                    last.format("%Y-%m-%d %H:%M:%S"),
                    account.trades.len()
                );
            }
        }
    }

    println!();
    Ok(())
}
