//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Bank ID - assigned by the persistence layer at bootstrap.
///
/// # Constraints:
/// - **Immutable**: the cache never assigns or changes it
/// - Used as the primary key when backing up bank balances
pub type BankId = u16;

/// Account number - unique within its owning bank only.
pub type AccountNo = u32;

/// Net bank balance in minor units.
///
/// Positive = owed by the operator to the bank,
/// negative = owed by the bank to the operator.
pub type BankBalance = i64;

/// Account balance in minor units.
pub type AccountBalance = i32;

/// Transfer amount in minor units. Must be non-negative.
pub type Amount = i32;
