//! Interbank balance cache
//!
//! A live, in-memory ledger of net balances between an operator and its
//! counterparty banks, continuously backed up to durable storage.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (BankId, AccountNo, etc.)
//! - [`ledger`] - Balance ledger, account tables and rotation ring
//! - [`bootstrap`] - One-time loader filling the ledger from snapshot streams
//! - [`backup`] - Periodic, staggered backups with drain-on-shutdown
//! - [`persistence`] - Snapshot stores (Postgres, in-memory) and stream pumps
//! - [`gateway`] - HTTP service layer
//! - [`snapshot`] - Snapshot record types
//! - [`error`] - Ledger errors

// Core types - must be first!
pub mod core_types;

pub mod backup;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod persistence;
pub mod snapshot;

// Convenient re-exports at crate root
pub use backup::{BackupHandle, BackupOrchestrator, BackupStreams, DrainReport};
pub use bootstrap::{BootstrapFeed, BootstrapStreams, bootstrap_channel, load_ledger};
pub use core_types::{AccountBalance, AccountNo, Amount, BankBalance, BankId};
pub use error::LedgerError;
pub use ledger::{Ledger, Party, Transfer};
pub use snapshot::{AccountSnapshot, BankSnapshot, SnapshotError};
