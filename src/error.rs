//! Ledger error types

use thiserror::Error;

use crate::core_types::{AccountNo, Amount};
use crate::snapshot::SnapshotError;

/// Ledger error types
///
/// `UnknownBank` is a data-integrity fault: the bank set is fixed at
/// bootstrap, so a transfer naming any other bank means either the
/// bootstrap data or the upstream request is corrupt.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Unknown bank: {0}")]
    UnknownBank(String),

    #[error("Amount must not be negative: {0}")]
    NegativeAmount(Amount),

    #[error("Account {account} references unknown bank {bank}")]
    BootstrapUnknownBank { bank: String, account: AccountNo },

    #[error("Bootstrap aborted: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl LedgerError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::UnknownBank(_) => "UNKNOWN_BANK",
            LedgerError::NegativeAmount(_) => "INVALID_AMOUNT",
            LedgerError::BootstrapUnknownBank { .. } => "BOOTSTRAP_UNKNOWN_BANK",
            LedgerError::Snapshot(_) => "BOOTSTRAP_FAILED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::NegativeAmount(_) => 400,
            LedgerError::UnknownBank(_) => 422,
            LedgerError::BootstrapUnknownBank { .. } | LedgerError::Snapshot(_) => 500,
        }
    }

    /// Whether the error indicates corrupted ledger state rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LedgerError::NegativeAmount(_))
    }
}
