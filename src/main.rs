//! Interbank balance cache
//!
//! Composition root. Startup and teardown order:
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │  Store   │──▶│ Bootstrap │──▶│    Ledger    │◀──│ Gateway  │
//! │ (PG/mem) │   │  Loader   │   │ (Arc, shared)│   │  (axum)  │
//! └──────────┘   └───────────┘   └──────┬───────┘   └──────────┘
//!      ▲                                │ read
//!      │ upsert  ┌──────────┐    ┌──────▼───────┐
//!      └─────────│  Writer  │◀───│   Backup     │
//!                └──────────┘    │ Orchestrator │
//!                                └──────────────┘
//! ```
//!
//! On SIGINT/SIGTERM the gateway stops accepting requests first, then the
//! orchestrator drains every balance to the writer, then the writer
//! finishes and the process exits.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use interbank_cache::backup::BackupOrchestrator;
use interbank_cache::bootstrap::{bootstrap_channel, load_ledger};
use interbank_cache::config::AppConfig;
use interbank_cache::gateway::{self, state::AppState};
use interbank_cache::ledger::Ledger;
use interbank_cache::persistence::{
    MemoryStore, PgSnapshotStore, SnapshotStore, feed_bootstrap, run_backup_writer,
};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Signal received, shutting down...");
}

/// Log the processed-transaction count at a fixed interval.
fn spawn_stats_reporter(ledger: Arc<Ledger>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            info!(transactions = ledger.transactions(), "Processed transactions");
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = interbank_cache::logging::init_logging(&app_config);

    info!("Starting interbank cache in {} mode", env);

    // Persistence
    let store: Arc<dyn SnapshotStore> = match &app_config.postgres_url {
        Some(url) => Arc::new(
            PgSnapshotStore::connect(url, app_config.postgres_max_connections)
                .await
                .context("Could not init DB connection")?,
        ),
        None => {
            warn!("No postgres_url configured, balances will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Bootstrap: no transfers are accepted until this completes
    let cache_config = &app_config.cache;
    let (feed, streams) = bootstrap_channel(cache_config.bootstrap_capacity);
    let feeder = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { feed_bootstrap(&*store, feed).await })
    };
    let ledger = Arc::new(load_ledger(streams).await.context("Bootstrap failed")?);
    feeder
        .await
        .context("Bootstrap feeder panicked")?
        .context("Bootstrap feeder failed")?;

    // Backups
    let (orchestrator, backup_streams) = BackupOrchestrator::new(
        Arc::clone(&ledger),
        cache_config.backup_interval(),
        cache_config.stream_capacity,
    );
    let writer = tokio::spawn(run_backup_writer(Arc::clone(&store), backup_streams));
    let backup = orchestrator.spawn();

    let stats = (cache_config.stats_interval_secs > 0).then(|| {
        spawn_stats_reporter(
            Arc::clone(&ledger),
            Duration::from_secs(cache_config.stats_interval_secs),
        )
    });

    // Serve until signalled
    let port = get_port_override().unwrap_or(app_config.gateway.port);
    let served = gateway::run_server(
        &app_config.gateway.host,
        port,
        Arc::new(AppState::new(Arc::clone(&ledger))),
        shutdown_signal(),
    )
    .await;

    // Teardown: drain even if the server failed
    if let Some(stats) = stats {
        stats.abort();
    }
    let report = backup.close().await.context("Backup task failed")?;
    let written = writer.await.context("Backup writer panicked")?;
    info!(
        banks = report.banks,
        accounts = report.accounts,
        written_banks = written.banks_written,
        written_accounts = written.accounts_written,
        failures = written.failures,
        "Cache closed"
    );
    ledger.print_state(false, &mut std::io::stdout().lock())?;

    served
}
