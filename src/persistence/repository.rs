//! Snapshot store trait
//!
//! Abstracts the durable side of the cache so the bootstrap feeder and
//! the backup writer can run against Postgres or an in-memory store.

use async_trait::async_trait;

use crate::snapshot::{AccountSnapshot, BankSnapshot, SnapshotError};

/// Durable home of bank and account balances.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Number of banks, used as a presizing hint.
    async fn bank_count(&self) -> Result<usize, SnapshotError>;

    /// Every bank row, in the order banks should enter the rotation ring.
    async fn load_banks(&self) -> Result<Vec<BankSnapshot>, SnapshotError>;

    /// Every account row. Only `bank_name` is guaranteed to be meaningful
    /// for routing; `bank_id` is filled in when the store knows it.
    async fn load_accounts(&self) -> Result<Vec<AccountSnapshot>, SnapshotError>;

    /// Persist one bank balance, keyed by `bank_id`.
    async fn upsert_bank(&self, row: &BankSnapshot) -> Result<(), SnapshotError>;

    /// Persist one account balance, keyed by `(bank_id, account)`.
    async fn upsert_account(&self, row: &AccountSnapshot) -> Result<(), SnapshotError>;
}
