//! Snapshot records exchanged with the persistence layer
//!
//! The same shapes flow both ways: inbound during bootstrap and
//! outbound from the backup orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{AccountBalance, AccountNo, BankBalance, BankId};

/// One bank row: `{name, id, balance}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSnapshot {
    pub name: String,
    pub bank_id: BankId,
    pub balance: BankBalance,
}

/// One account row: `{bank, account, balance}`.
///
/// Inbound rows are resolved by `bank_name`; outbound rows also carry
/// `bank_id` so the store can upsert without a name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub bank_name: String,
    pub bank_id: BankId,
    pub account: AccountNo,
    pub balance: AccountBalance,
}

/// Errors raised while producing or consuming snapshot records.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to decode {table} row: {reason}")]
    Decode { table: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Snapshot stream closed: {0}")]
    StreamClosed(&'static str),
}

impl SnapshotError {
    pub fn decode(table: &'static str, reason: impl Into<String>) -> Self {
        SnapshotError::Decode {
            table,
            reason: reason.into(),
        }
    }
}
