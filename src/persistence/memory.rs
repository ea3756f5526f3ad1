//! In-memory snapshot store, for tests and for running without Postgres.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::repository::SnapshotStore;
use crate::core_types::{AccountBalance, AccountNo, BankBalance, BankId};
use crate::snapshot::{AccountSnapshot, BankSnapshot, SnapshotError};

#[derive(Debug, Default)]
struct Tables {
    /// bank_id -> (name, balance)
    banks: BTreeMap<BankId, (String, BankBalance)>,
    /// (bank_id, account) -> balance
    accounts: BTreeMap<(BankId, AccountNo), AccountBalance>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a bank row.
    pub fn insert_bank(&self, bank_id: BankId, name: impl Into<String>, balance: BankBalance) {
        self.tables()
            .banks
            .insert(bank_id, (name.into(), balance));
    }

    /// Seed an account row.
    pub fn insert_account(&self, bank_id: BankId, account: AccountNo, balance: AccountBalance) {
        self.tables().accounts.insert((bank_id, account), balance);
    }

    /// Make every subsequent upsert fail, to simulate an unavailable database.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Number of successful upserts so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    pub fn bank_balance(&self, bank_id: BankId) -> Option<BankBalance> {
        self.tables().banks.get(&bank_id).map(|(_, balance)| *balance)
    }

    pub fn account_balance(&self, bank_id: BankId, account: AccountNo) -> Option<AccountBalance> {
        self.tables().accounts.get(&(bank_id, account)).copied()
    }

    pub fn account_count(&self) -> usize {
        self.tables().accounts.len()
    }

    fn check_writable(&self) -> Result<(), SnapshotError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(SnapshotError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn bank_count(&self) -> Result<usize, SnapshotError> {
        Ok(self.tables().banks.len())
    }

    async fn load_banks(&self) -> Result<Vec<BankSnapshot>, SnapshotError> {
        Ok(self
            .tables()
            .banks
            .iter()
            .map(|(id, (name, balance))| BankSnapshot {
                name: name.clone(),
                bank_id: *id,
                balance: *balance,
            })
            .collect())
    }

    async fn load_accounts(&self) -> Result<Vec<AccountSnapshot>, SnapshotError> {
        let tables = self.tables();
        tables
            .accounts
            .iter()
            .map(|((bank_id, account), balance)| {
                let (name, _) = tables.banks.get(bank_id).ok_or_else(|| {
                    SnapshotError::decode("accounts", format!("no bank with id {}", bank_id))
                })?;
                Ok(AccountSnapshot {
                    bank_name: name.clone(),
                    bank_id: *bank_id,
                    account: *account,
                    balance: *balance,
                })
            })
            .collect()
    }

    async fn upsert_bank(&self, row: &BankSnapshot) -> Result<(), SnapshotError> {
        self.check_writable()?;
        self.tables()
            .banks
            .entry(row.bank_id)
            .and_modify(|(_, balance)| *balance = row.balance)
            .or_insert_with(|| (row.name.clone(), row.balance));
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn upsert_account(&self, row: &AccountSnapshot) -> Result<(), SnapshotError> {
        self.check_writable()?;
        self.tables()
            .accounts
            .insert((row.bank_id, row.account), row.balance);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
