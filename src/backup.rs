//! Backup Orchestrator
//!
//! Background task that copies ledger state out to the persistence layer.
//!
//! ```text
//! t:      0    P/2   P    3P/2  2P   5P/2  3P
//! bank:               ●          ●          ●       every P
//! account:                             ●            every 2P, from P/2 + 2P
//! ```
//!
//! A bank tick emits every bank balance. An account tick advances the
//! rotation ring and emits the accounts of one bank only, so a tick costs
//! one account table rather than the whole ledger. On shutdown the task
//! emits every bank once and then walks the ring once, flushing each
//! bank's accounts, before reporting completion.
//!
//! Records are copied out under the ledger's shared lock and sent after
//! it is released, so a slow consumer never blocks transfers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::ledger::Ledger;
use crate::snapshot::{AccountSnapshot, BankSnapshot};

/// Receiving ends of the outbound backup streams.
///
/// Both close once the orchestrator has finished its shutdown drain.
pub struct BackupStreams {
    pub banks: mpsc::Receiver<BankSnapshot>,
    pub accounts: mpsc::Receiver<AccountSnapshot>,
}

/// What the shutdown drain emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub banks: usize,
    pub accounts: usize,
    pub bank_visits: usize,
}

pub struct BackupOrchestrator {
    ledger: Arc<Ledger>,
    interval: Duration,
    bank_tx: mpsc::Sender<BankSnapshot>,
    account_tx: mpsc::Sender<AccountSnapshot>,
}

impl BackupOrchestrator {
    /// Create an orchestrator with bank period `interval`.
    ///
    /// `capacity` bounds each outbound stream; a full stream suspends the
    /// flush in progress until the consumer catches up.
    pub fn new(ledger: Arc<Ledger>, interval: Duration, capacity: usize) -> (Self, BackupStreams) {
        let (bank_tx, bank_rx) = mpsc::channel(capacity.max(1));
        let (account_tx, account_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                ledger,
                interval,
                bank_tx,
                account_tx,
            },
            BackupStreams {
                banks: bank_rx,
                accounts: account_rx,
            },
        )
    }

    /// Emit one record per bank. Returns the number sent.
    pub async fn flush_banks(&self) -> usize {
        let rows = self.ledger.bank_snapshots();
        let mut sent = 0;
        for row in rows {
            if self.bank_tx.send(row).await.is_err() {
                warn!(target: "BACKUP", "Bank backup stream closed, dropping flush");
                break;
            }
            sent += 1;
        }
        debug!(target: "BACKUP", sent, "Bank balances flushed");
        sent
    }

    /// Advance the ring and emit the accounts of the bank it lands on.
    ///
    /// Returns the bank visited and the number of records sent.
    pub async fn flush_next_accounts(&self) -> Option<(String, usize)> {
        let (bank, rows) = self.ledger.rotate_accounts()?;
        let mut sent = 0;
        for row in rows {
            if self.account_tx.send(row).await.is_err() {
                warn!(target: "BACKUP", bank = %bank, "Account backup stream closed, dropping flush");
                break;
            }
            sent += 1;
        }
        debug!(target: "BACKUP", bank = %bank, sent, "Account balances flushed");
        Some((bank, sent))
    }

    /// One bank flush, then one full ring rotation of account flushes.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport {
            banks: self.flush_banks().await,
            ..DrainReport::default()
        };
        for _ in 0..self.ledger.ring_len() {
            if let Some((_, sent)) = self.flush_next_accounts().await {
                report.accounts += sent;
                report.bank_visits += 1;
            }
        }
        report
    }

    /// Tick until `shutdown` fires (or its sender is dropped), then drain.
    ///
    /// Consumes the orchestrator so both outbound streams close on return.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) -> DrainReport {
        let period = self.interval;
        let start = Instant::now();

        let mut bank_ticker = interval_at(start + period, period);
        bank_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut account_ticker = interval_at(start + period / 2 + period * 2, period * 2);
        account_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(target: "BACKUP", ?period, "Backup orchestrator started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = bank_ticker.tick() => {
                    self.flush_banks().await;
                }
                _ = account_ticker.tick() => {
                    self.flush_next_accounts().await;
                }
            }
        }

        let report = self.drain().await;
        info!(
            target: "BACKUP",
            banks = report.banks,
            accounts = report.accounts,
            bank_visits = report.bank_visits,
            "Shutdown drain complete"
        );
        report
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self) -> BackupHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        BackupHandle { shutdown_tx, task }
    }
}

/// Handle to a running orchestrator.
pub struct BackupHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<DrainReport>,
}

impl BackupHandle {
    /// Signal shutdown and wait until the drain pass has finished.
    pub async fn close(self) -> Result<DrainReport, tokio::task::JoinError> {
        // A send error only means the task already stopped.
        let _ = self.shutdown_tx.send(());
        self.task.await
    }
}
