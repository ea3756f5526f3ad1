//! Balance Ledger
//!
//! Net balances between the operator and each counterparty bank, plus
//! the per-account balances inside each bank.
//!
//! # Locking
//!
//! ```text
//! Ledger.inner (RwLock)          structural: bank map + rotation ring
//!   └── Bank.accounts (DashMap)  per-bank account table, sharded
//!         └── AtomicI32          balance cell
//! ```
//!
//! Locks are always taken top-down. `apply` only ever holds the
//! structural lock in shared mode; balance changes are atomic adds.
//! Exclusive structural access is needed only while bootstrapping.
//!
//! The four counter updates of one transfer are independent atomic adds,
//! not one transaction: a reader may observe a transfer half-applied.

pub mod accounts;
pub mod ring;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::core_types::{AccountBalance, AccountNo, Amount, BankBalance, BankId};
use crate::error::LedgerError;
use crate::snapshot::{AccountSnapshot, BankSnapshot, SnapshotError};

pub use accounts::AccountTable;
pub use ring::RotationRing;

/// One counterparty bank.
#[derive(Debug)]
pub struct Bank {
    id: BankId,
    balance: AtomicI64,
    accounts: AccountTable,
}

impl Bank {
    fn new(id: BankId, balance: BankBalance) -> Self {
        Self {
            id,
            balance: AtomicI64::new(balance),
            accounts: AccountTable::new(),
        }
    }

    pub fn id(&self) -> BankId {
        self.id
    }

    pub fn balance(&self) -> BankBalance {
        self.balance.load(Ordering::Acquire)
    }

    pub fn accounts(&self) -> &AccountTable {
        &self.accounts
    }
}

/// One side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Party {
    pub bank: String,
    pub account: AccountNo,
}

impl Party {
    pub fn new(bank: impl Into<String>, account: AccountNo) -> Self {
        Self {
            bank: bank.into(),
            account,
        }
    }
}

/// A payment from `sender` to `receiver`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transfer {
    pub sender: Party,
    pub receiver: Party,
    pub amount: Amount,
}

impl Transfer {
    pub fn new(sender: Party, receiver: Party, amount: Amount) -> Self {
        Self {
            sender,
            receiver,
            amount,
        }
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    banks: FxHashMap<String, Bank>,
    ring: RotationRing,
}

/// Point-in-time copy of one bank, used by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankView {
    pub name: String,
    pub bank_id: BankId,
    pub balance: BankBalance,
    /// Sorted by account number. Empty unless accounts were requested.
    pub accounts: Vec<(AccountNo, AccountBalance)>,
}

/// The ledger. Owned by the composition root and shared via `Arc`.
#[derive(Debug, Default)]
pub struct Ledger {
    inner: RwLock<LedgerInner>,
    transactions: AtomicU64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presize for `banks` banks. Purely an allocation hint.
    pub fn with_capacity(banks: usize) -> Self {
        let mut map = FxHashMap::default();
        map.reserve(banks);
        Self {
            inner: RwLock::new(LedgerInner {
                banks: map,
                ring: RotationRing::with_capacity(banks),
            }),
            transactions: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================================
    // BOOTSTRAP
    // ============================================================

    /// Load historical state: every bank row first, then every account row.
    ///
    /// Must not run concurrently with `apply`. The first failed record
    /// aborts the load; records already applied stay in place, so callers
    /// discard the ledger on error.
    pub fn bootstrap<B, A>(&self, banks: B, accounts: A) -> Result<(), LedgerError>
    where
        B: IntoIterator<Item = Result<BankSnapshot, SnapshotError>>,
        A: IntoIterator<Item = Result<AccountSnapshot, SnapshotError>>,
    {
        let mut inner = self.write();
        for row in banks {
            Self::load_bank_locked(&mut inner, row?);
        }
        for row in accounts {
            Self::load_account_locked(&inner, row?)?;
        }
        Ok(())
    }

    /// Create or update one bank from a bootstrap row.
    pub fn load_bank(&self, row: BankSnapshot) {
        let mut inner = self.write();
        Self::load_bank_locked(&mut inner, row);
    }

    /// Create or update one account from a bootstrap row.
    ///
    /// The owning bank must already be loaded.
    pub fn load_account(&self, row: AccountSnapshot) -> Result<(), LedgerError> {
        let inner = self.read();
        Self::load_account_locked(&inner, row)
    }

    fn load_bank_locked(inner: &mut LedgerInner, row: BankSnapshot) {
        match inner.banks.get_mut(&row.name) {
            Some(bank) => {
                warn!(target: "BOOTSTRAP", bank = %row.name, "Duplicate bank row, overwriting");
                bank.id = row.bank_id;
                bank.balance.store(row.balance, Ordering::Release);
            }
            None => {
                inner.ring.append(row.name.clone());
                inner
                    .banks
                    .insert(row.name, Bank::new(row.bank_id, row.balance));
            }
        }
    }

    fn load_account_locked(inner: &LedgerInner, row: AccountSnapshot) -> Result<(), LedgerError> {
        let bank = inner
            .banks
            .get(&row.bank_name)
            .ok_or_else(|| LedgerError::BootstrapUnknownBank {
                bank: row.bank_name.clone(),
                account: row.account,
            })?;
        bank.accounts.store(row.account, row.balance);
        Ok(())
    }

    // ============================================================
    // APPLY
    // ============================================================

    /// Apply one transfer to the four affected counters.
    ///
    /// Both banks are checked before anything is touched, so a rejected
    /// transfer leaves no trace.
    pub fn apply(&self, transfer: &Transfer) -> Result<(), LedgerError> {
        if transfer.amount < 0 {
            return Err(LedgerError::NegativeAmount(transfer.amount));
        }

        let inner = self.read();
        let sender = inner
            .banks
            .get(&transfer.sender.bank)
            .ok_or_else(|| LedgerError::UnknownBank(transfer.sender.bank.clone()))?;
        let receiver = inner
            .banks
            .get(&transfer.receiver.bank)
            .ok_or_else(|| LedgerError::UnknownBank(transfer.receiver.bank.clone()))?;

        let amount = transfer.amount;
        sender
            .balance
            .fetch_sub(BankBalance::from(amount), Ordering::AcqRel);
        receiver
            .balance
            .fetch_add(BankBalance::from(amount), Ordering::AcqRel);
        sender.accounts.add(transfer.sender.account, -amount);
        receiver.accounts.add(transfer.receiver.account, amount);

        self.transactions.fetch_add(1, Ordering::AcqRel);
        debug!(
            target: "LEDGER",
            from = %transfer.sender.bank,
            to = %transfer.receiver.bank,
            amount,
            "Transfer applied"
        );
        Ok(())
    }

    // ============================================================
    // READ VIEWS
    // ============================================================

    /// Number of transfers applied so far.
    pub fn transactions(&self) -> u64 {
        self.transactions.load(Ordering::Acquire)
    }

    pub fn bank_count(&self) -> usize {
        self.read().banks.len()
    }

    pub fn bank_balance(&self, bank: &str) -> Option<BankBalance> {
        self.read().banks.get(bank).map(Bank::balance)
    }

    pub fn account_balance(&self, bank: &str, account: AccountNo) -> Option<AccountBalance> {
        self.read()
            .banks
            .get(bank)
            .and_then(|b| b.accounts.get(account))
    }

    /// Total number of accounts across all banks.
    pub fn account_count(&self) -> usize {
        self.read().banks.values().map(|b| b.accounts.len()).sum()
    }

    /// Ring members in rotation order.
    pub fn ring_order(&self) -> Vec<String> {
        self.read().ring.iter().map(str::to_string).collect()
    }

    pub fn ring_len(&self) -> usize {
        self.read().ring.len()
    }

    /// Current balance of every bank, in ring order.
    pub fn bank_snapshots(&self) -> Vec<BankSnapshot> {
        let inner = self.read();
        inner
            .ring
            .iter()
            .filter_map(|name| {
                inner.banks.get(name).map(|bank| BankSnapshot {
                    name: name.to_string(),
                    bank_id: bank.id,
                    balance: bank.balance(),
                })
            })
            .collect()
    }

    /// Current balance of every account of one bank.
    pub fn account_snapshots(&self, bank: &str) -> Option<Vec<AccountSnapshot>> {
        let inner = self.read();
        inner
            .banks
            .get(bank)
            .map(|b| Self::collect_accounts(bank, b))
    }

    /// Advance the rotation ring and copy out the accounts of the bank it
    /// lands on. Returns `None` when there are no banks.
    pub fn rotate_accounts(&self) -> Option<(String, Vec<AccountSnapshot>)> {
        let inner = self.read();
        let name = inner.ring.advance()?;
        let bank = inner.banks.get(name)?;
        Some((name.to_string(), Self::collect_accounts(name, bank)))
    }

    fn collect_accounts(name: &str, bank: &Bank) -> Vec<AccountSnapshot> {
        bank.accounts
            .entries()
            .into_iter()
            .map(|(account, balance)| AccountSnapshot {
                bank_name: name.to_string(),
                bank_id: bank.id,
                account,
                balance,
            })
            .collect()
    }

    /// Copy of every bank, sorted by name, with accounts if requested.
    pub fn snapshot(&self, include_accounts: bool) -> Vec<BankView> {
        let inner = self.read();
        let mut views: Vec<BankView> = inner
            .banks
            .iter()
            .map(|(name, bank)| {
                let mut accounts = if include_accounts {
                    bank.accounts.entries()
                } else {
                    Vec::new()
                };
                accounts.sort_unstable_by_key(|(account, _)| *account);
                BankView {
                    name: name.clone(),
                    bank_id: bank.id,
                    balance: bank.balance(),
                    accounts,
                }
            })
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }

    /// Write a human-readable dump of the ledger.
    pub fn print_state<W: Write>(&self, include_accounts: bool, out: &mut W) -> io::Result<()> {
        let views = self.snapshot(include_accounts);

        writeln!(out, "Processed {} transactions.", self.transactions())?;
        writeln!(out, "Bank balances:")?;
        writeln!(out, "{{")?;
        for view in &views {
            writeln!(out, "\t{}: {}", view.name, view.balance)?;
        }
        writeln!(out, "}}")?;

        if include_accounts {
            writeln!(out, "Account balances:")?;
            writeln!(out, "{{")?;
            for view in &views {
                writeln!(out, "\t{}: {{", view.name)?;
                for (account, balance) in &view.accounts {
                    writeln!(out, "\t\t{}: {}", account, balance)?;
                }
                writeln!(out, "\t}}")?;
            }
            writeln!(out, "}}")?;
        }
        Ok(())
    }
}
