//! This module defines the domain data types.

pub use account::{Account, AccountId, AccountType, NewAccount, ParseAccountTypeError};
pub use category::{Category, CategoryId, NewCategory};
pub use transaction::{
    NewTransaction, ParseRecurringIntervalError, ParseTransactionTypeError, Recurrence,
    RecurringInterval, Transaction, TransactionType,
};

mod account;
mod category;
mod transaction;

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseID = i64;

/// Alias for the opaque ID of an account owner.
///
/// User records are owned by the external auth collaborator, the ledger only
/// compares these IDs for ownership checks.
pub type UserID = i64;
