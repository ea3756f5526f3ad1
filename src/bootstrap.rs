//! Bootstrap Loader
//!
//! Fills a fresh [`Ledger`] from the persistence layer before any
//! transfer traffic is accepted.
//!
//! ```text
//! producer                        loader
//! ────────                        ──────
//! bank_count ──(oneshot)────────▶ presize
//! bank rows  ──(mpsc, closed)───▶ load_bank ...      (fully drained first)
//! acct rows  ──(mpsc, closed)───▶ load_account ...   (bank must exist)
//! ```

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::snapshot::{AccountSnapshot, BankSnapshot, SnapshotError};

pub type BankRow = Result<BankSnapshot, SnapshotError>;
pub type AccountRow = Result<AccountSnapshot, SnapshotError>;

/// Producer side, handed to the persistence layer.
pub struct BootstrapFeed {
    pub bank_count: oneshot::Sender<usize>,
    pub banks: mpsc::Sender<BankRow>,
    pub accounts: mpsc::Sender<AccountRow>,
}

/// Consumer side, handed to [`load_ledger`].
pub struct BootstrapStreams {
    pub bank_count: oneshot::Receiver<usize>,
    pub banks: mpsc::Receiver<BankRow>,
    pub accounts: mpsc::Receiver<AccountRow>,
}

/// Create the handshake and the two row streams, each bounded to `capacity`.
pub fn bootstrap_channel(capacity: usize) -> (BootstrapFeed, BootstrapStreams) {
    let (count_tx, count_rx) = oneshot::channel();
    let (banks_tx, banks_rx) = mpsc::channel(capacity.max(1));
    let (accounts_tx, accounts_rx) = mpsc::channel(capacity.max(1));
    (
        BootstrapFeed {
            bank_count: count_tx,
            banks: banks_tx,
            accounts: accounts_tx,
        },
        BootstrapStreams {
            bank_count: count_rx,
            banks: banks_rx,
            accounts: accounts_rx,
        },
    )
}

/// Build a ledger from the bootstrap streams.
///
/// The bank stream is drained to its end before the first account row is
/// read. Any `Err` row or any account naming an unloaded bank aborts the
/// whole load; no partially loaded ledger is returned.
pub async fn load_ledger(streams: BootstrapStreams) -> Result<Ledger, LedgerError> {
    let BootstrapStreams {
        bank_count,
        mut banks,
        mut accounts,
    } = streams;

    let expected = match bank_count.await {
        Ok(n) => n,
        Err(_) => {
            warn!(target: "BOOTSTRAP", "Bank count handshake dropped, not presizing");
            0
        }
    };
    let ledger = Ledger::with_capacity(expected);

    let mut bank_rows = 0usize;
    while let Some(row) = banks.recv().await {
        ledger.load_bank(row?);
        bank_rows += 1;
    }

    let mut account_rows = 0usize;
    while let Some(row) = accounts.recv().await {
        ledger.load_account(row?)?;
        account_rows += 1;
    }

    if expected != 0 && expected != ledger.bank_count() {
        warn!(
            target: "BOOTSTRAP",
            expected,
            loaded = ledger.bank_count(),
            "Bank count hint does not match loaded banks"
        );
    }
    info!(
        target: "BOOTSTRAP",
        banks = ledger.bank_count(),
        bank_rows,
        account_rows,
        "Ledger bootstrapped"
    );
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(name: &str, id: u16, balance: i64) -> BankRow {
        Ok(BankSnapshot {
            name: name.to_string(),
            bank_id: id,
            balance,
        })
    }

    fn account(bank: &str, account: u32, balance: i32) -> AccountRow {
        Ok(AccountSnapshot {
            bank_name: bank.to_string(),
            bank_id: 0,
            account,
            balance,
        })
    }

    #[tokio::test]
    async fn test_load_in_order() {
        let (feed, streams) = bootstrap_channel(4);

        let producer = tokio::spawn(async move {
            feed.bank_count.send(2).unwrap();
            feed.banks.send(bank("Alpha", 1, 5)).await.unwrap();
            feed.banks.send(bank("Beta", 2, -5)).await.unwrap();
            drop(feed.banks);
            feed.accounts.send(account("Beta", 7, -5)).await.unwrap();
        });

        let ledger = load_ledger(streams).await.unwrap();
        producer.await.unwrap();

        assert_eq!(ledger.ring_order(), vec!["Alpha", "Beta"]);
        assert_eq!(ledger.bank_balance("Alpha"), Some(5));
        assert_eq!(ledger.account_balance("Beta", 7), Some(-5));
    }

    #[tokio::test]
    async fn test_accounts_wait_for_bank_stream_end() {
        let (feed, streams) = bootstrap_channel(4);

        // The account row is queued before its bank; it must still resolve
        // because the loader drains banks to completion first.
        feed.accounts.send(account("Late", 1, 3)).await.unwrap();
        drop(feed.accounts);
        feed.bank_count.send(1).unwrap();
        feed.banks.send(bank("Late", 9, 0)).await.unwrap();
        drop(feed.banks);

        let ledger = load_ledger(streams).await.unwrap();
        assert_eq!(ledger.account_balance("Late", 1), Some(3));
    }

    #[tokio::test]
    async fn test_decode_error_aborts() {
        let (feed, streams) = bootstrap_channel(4);
        feed.bank_count.send(1).unwrap();
        feed.banks
            .send(Err(SnapshotError::decode("banks", "id out of range")))
            .await
            .unwrap();
        drop(feed.banks);
        drop(feed.accounts);

        let err = load_ledger(streams).await.unwrap_err();
        assert!(matches!(err, LedgerError::Snapshot(SnapshotError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_unknown_bank_account_aborts() {
        let (feed, streams) = bootstrap_channel(4);
        feed.bank_count.send(0).unwrap();
        drop(feed.banks);
        feed.accounts.send(account("Ghost", 1, 1)).await.unwrap();
        drop(feed.accounts);

        let err = load_ledger(streams).await.unwrap_err();
        assert!(matches!(err, LedgerError::BootstrapUnknownBank { .. }));
    }

    #[tokio::test]
    async fn test_missing_handshake_is_not_fatal() {
        let (feed, streams) = bootstrap_channel(4);
        drop(feed.bank_count);
        feed.banks.send(bank("Solo", 1, 0)).await.unwrap();
        drop(feed.banks);
        drop(feed.accounts);

        let ledger = load_ledger(streams).await.unwrap();
        assert_eq!(ledger.bank_count(), 1);
    }
}
