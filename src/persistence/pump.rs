//! Stream plumbing between the cache and a [`SnapshotStore`].
//!
//! - [`feed_bootstrap`] reads historical rows and pushes them down the
//!   bootstrap streams in the order the loader requires.
//! - [`run_backup_writer`] consumes the orchestrator's outbound streams
//!   and upserts each record. A failed upsert is logged and dropped; the
//!   next tick re-emits the current value anyway.

use std::sync::Arc;
use tracing::{debug, error, info};

use super::repository::SnapshotStore;
use crate::backup::BackupStreams;
use crate::bootstrap::BootstrapFeed;
use crate::snapshot::SnapshotError;

/// Send the bank count, every bank row, then every account row.
///
/// Each stream is closed once its rows are sent. A query failure is also
/// forwarded down the stream being filled so the loader aborts instead of
/// waiting on a partial load.
pub async fn feed_bootstrap(
    store: &dyn SnapshotStore,
    feed: BootstrapFeed,
) -> Result<(), SnapshotError> {
    let BootstrapFeed {
        bank_count,
        banks,
        accounts,
    } = feed;

    let count = match store.bank_count().await {
        Ok(n) => n,
        Err(e) => {
            error!(target: "PERSIST", "Could not count banks: {}", e);
            0
        }
    };
    debug!(target: "PERSIST", count, "Sending bank count");
    // The loader only uses the count for presizing.
    let _ = bank_count.send(count);

    let bank_rows = match store.load_banks().await {
        Ok(rows) => rows,
        Err(e) => {
            error!(target: "PERSIST", "Could not retrieve bank balances: {}", e);
            let _ = banks.send(Err(SnapshotError::decode("banks", e.to_string()))).await;
            return Err(e);
        }
    };
    let sent_banks = bank_rows.len();
    for row in bank_rows {
        banks
            .send(Ok(row))
            .await
            .map_err(|_| SnapshotError::StreamClosed("bootstrap banks"))?;
    }
    drop(banks);

    let account_rows = match store.load_accounts().await {
        Ok(rows) => rows,
        Err(e) => {
            error!(target: "PERSIST", "Could not retrieve account balances: {}", e);
            let _ = accounts
                .send(Err(SnapshotError::decode("accounts", e.to_string())))
                .await;
            return Err(e);
        }
    };
    let sent_accounts = account_rows.len();
    for row in account_rows {
        accounts
            .send(Ok(row))
            .await
            .map_err(|_| SnapshotError::StreamClosed("bootstrap accounts"))?;
    }

    info!(
        target: "PERSIST",
        banks = sent_banks,
        accounts = sent_accounts,
        "Bootstrap rows sent"
    );
    Ok(())
}

/// Counters from one writer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub banks_written: u64,
    pub accounts_written: u64,
    pub failures: u64,
}

/// Upsert every outbound record until both streams are closed.
pub async fn run_backup_writer(
    store: Arc<dyn SnapshotStore>,
    streams: BackupStreams,
) -> WriterStats {
    let BackupStreams {
        mut banks,
        mut accounts,
    } = streams;
    let mut stats = WriterStats::default();
    let mut banks_open = true;
    let mut accounts_open = true;

    while banks_open || accounts_open {
        tokio::select! {
            row = banks.recv(), if banks_open => match row {
                Some(row) => match store.upsert_bank(&row).await {
                    Ok(()) => stats.banks_written += 1,
                    Err(e) => {
                        stats.failures += 1;
                        error!(
                            target: "PERSIST",
                            bank_id = row.bank_id,
                            "Error updating bank balance: {}", e
                        );
                    }
                },
                None => banks_open = false,
            },
            row = accounts.recv(), if accounts_open => match row {
                Some(row) => match store.upsert_account(&row).await {
                    Ok(()) => stats.accounts_written += 1,
                    Err(e) => {
                        stats.failures += 1;
                        error!(
                            target: "PERSIST",
                            bank_id = row.bank_id,
                            account = row.account,
                            "Error updating account balance: {}", e
                        );
                    }
                },
                None => accounts_open = false,
            },
        }
    }

    info!(
        target: "PERSIST",
        banks = stats.banks_written,
        accounts = stats.accounts_written,
        failures = stats.failures,
        "Backup writer stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupOrchestrator;
    use crate::bootstrap::{bootstrap_channel, load_ledger};
    use crate::ledger::{Party, Transfer};
    use crate::persistence::MemoryStore;
    use std::time::Duration;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_bank(1, "Alpha", 100);
        store.insert_bank(2, "Beta", -100);
        store.insert_account(1, 10, 100);
        store.insert_account(2, 20, -100);
        store
    }

    #[tokio::test]
    async fn test_feed_then_load() {
        let store = seeded_store();
        let (feed, streams) = bootstrap_channel(1);

        let feeder = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { feed_bootstrap(&*store, feed).await })
        };
        let ledger = load_ledger(streams).await.unwrap();
        feeder.await.unwrap().unwrap();

        assert_eq!(ledger.ring_order(), vec!["Alpha", "Beta"]);
        assert_eq!(ledger.bank_balance("Beta"), Some(-100));
        assert_eq!(ledger.account_balance("Alpha", 10), Some(100));
    }

    #[tokio::test]
    async fn test_feed_failure_aborts_loader() {
        let store = MemoryStore::new();
        store.insert_bank(1, "Alpha", 0);
        store.insert_account(5, 1, 1); // orphan row -> decode failure
        let (feed, streams) = bootstrap_channel(8);

        let (fed, loaded) = tokio::join!(feed_bootstrap(&store, feed), load_ledger(streams));
        assert!(fed.is_err());
        assert!(loaded.is_err());
    }

    #[tokio::test]
    async fn test_writer_persists_drain() {
        let store = seeded_store();
        let (feed, streams) = bootstrap_channel(8);
        let (_, ledger) = tokio::join!(feed_bootstrap(&*store, feed), load_ledger(streams));
        let ledger = Arc::new(ledger.unwrap());

        ledger
            .apply(&Transfer::new(
                Party::new("Alpha", 10),
                Party::new("Beta", 21),
                40,
            ))
            .unwrap();

        let (orch, backup) = BackupOrchestrator::new(Arc::clone(&ledger), Duration::from_secs(60), 2);
        let writer = tokio::spawn(run_backup_writer(store.clone(), backup));
        orch.spawn().close().await.unwrap();
        let stats = writer.await.unwrap();

        assert_eq!(stats.failures, 0);
        assert_eq!(store.bank_balance(1), Some(60));
        assert_eq!(store.bank_balance(2), Some(-60));
        assert_eq!(store.account_balance(1, 10), Some(60));
        assert_eq!(store.account_balance(2, 21), Some(40));
        assert_eq!(store.account_count(), 3);
    }

    #[tokio::test]
    async fn test_writer_survives_failed_writes() {
        let store = seeded_store();
        let (feed, streams) = bootstrap_channel(8);
        let (_, ledger) = tokio::join!(feed_bootstrap(&*store, feed), load_ledger(streams));
        let ledger = Arc::new(ledger.unwrap());

        let (orch, backup) = BackupOrchestrator::new(Arc::clone(&ledger), Duration::from_secs(60), 4);
        let writer = tokio::spawn(run_backup_writer(store.clone(), backup));

        // First flush hits a dead database and is dropped.
        store.set_fail_writes(true);
        ledger
            .apply(&Transfer::new(Party::new("Alpha", 10), Party::new("Beta", 20), 1))
            .unwrap();
        assert_eq!(orch.flush_banks().await, 2);
        tokio::task::yield_now().await;
        assert_eq!(store.bank_balance(1), Some(100));

        // The next pass carries the latest values without any retry.
        store.set_fail_writes(false);
        ledger
            .apply(&Transfer::new(Party::new("Alpha", 10), Party::new("Beta", 20), 1))
            .unwrap();
        orch.spawn().close().await.unwrap();

        let stats = writer.await.unwrap();
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.banks_written, 2);
        assert_eq!(stats.accounts_written, 2);
        assert_eq!(store.bank_balance(1), Some(98));
        assert_eq!(store.account_balance(2, 20), Some(-98));
    }
}
