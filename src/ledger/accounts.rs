//! Per-bank account table.
//!
//! Maps account numbers to atomic balance cells in a `DashMap`. The hot
//! path takes a shard read lock and does one atomic add. A first touch
//! escalates to the shard write lock through `entry()`, which re-checks
//! presence before inserting, so two racing first touches of the same
//! account always end up sharing one cell.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::core_types::{AccountBalance, AccountNo};

#[derive(Debug, Default)]
pub struct AccountTable {
    cells: DashMap<AccountNo, AtomicI32>,
}

impl AccountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to an account, creating it at zero on first reference.
    ///
    /// Returns the balance after the add.
    pub fn add(&self, account: AccountNo, delta: AccountBalance) -> AccountBalance {
        if let Some(cell) = self.cells.get(&account) {
            return cell.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta);
        }

        let cell = self
            .cells
            .entry(account)
            .or_insert_with(|| AtomicI32::new(0));
        cell.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
    }

    /// Overwrite an account's balance, creating it if needed.
    pub fn store(&self, account: AccountNo, balance: AccountBalance) {
        self.cells
            .entry(account)
            .or_insert_with(|| AtomicI32::new(0))
            .store(balance, Ordering::Release);
    }

    pub fn get(&self, account: AccountNo) -> Option<AccountBalance> {
        self.cells
            .get(&account)
            .map(|cell| cell.load(Ordering::Acquire))
    }

    /// Point-in-time copy of every account, unordered.
    pub fn entries(&self) -> Vec<(AccountNo, AccountBalance)> {
        self.cells
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Acquire)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
