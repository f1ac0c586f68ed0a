//! Defines the ledger store trait: transaction rows plus the derived account
//! balances they feed.

use time::Date;

use crate::{
    Error,
    models::{AccountId, DatabaseID, NewTransaction, Transaction},
};

/// Handles the creation, mutation and retrieval of transactions, keeping each
/// account's cached balance equal to the signed sum of its live transactions.
///
/// Every mutation commits the row change and the balance adjustment together
/// or not at all; no partial balance update ever persists.
pub trait LedgerStore {
    /// Create a new transaction in the store, adding its signed amount to the
    /// owning account's balance atomically.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if the account or category does not exist,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn create(&mut self, new_transaction: NewTransaction) -> Result<Transaction, Error>;

    /// Replace the mutable fields of the transaction with `id` and apply the
    /// balance delta `(new signed amount) - (old signed amount)` atomically.
    ///
    /// If the account changed, the old signed amount is removed from the old
    /// account and the new signed amount applied to the new account as a
    /// single atomic multi-account adjustment.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid transaction, or
    ///   the new account or category does not exist,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn update(
        &mut self,
        id: DatabaseID,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, Error>;

    /// Remove the transaction with `id`, reversing its signed amount from the
    /// account balance atomically. Returns the removed transaction.
    ///
    /// # Errors
    /// Returns an [Error::NotFound] if `id` does not refer to a valid
    /// transaction.
    fn delete(&mut self, id: DatabaseID) -> Result<Transaction, Error>;

    /// Retrieve a transaction from the store by its `id`.
    ///
    /// # Errors
    /// Returns an [Error::NotFound] if `id` does not refer to a valid
    /// transaction.
    fn get(&self, id: DatabaseID) -> Result<Transaction, Error>;

    /// Retrieve the transactions belonging to `account_id`, ordered by
    /// occurred-on date descending with ties broken by creation order
    /// descending (most recent first).
    ///
    /// An empty vector is returned if the account has no transactions.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn list_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>, Error>;

    /// Retrieve the recurring transactions whose next occurrence is due on or
    /// before `now`.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an SQL error.
    fn due_recurring(&self, now: Date) -> Result<Vec<Transaction>, Error>;

    /// Materialize the next due occurrence of the recurring transaction
    /// `origin_id`, if one is due on or before `now`.
    ///
    /// In a single atomic step: insert a non-recurring copy of the origin
    /// dated at its `next_occurrence_at` (adjusting the account balance),
    /// advance the origin's schedule to the following occurrence, and set its
    /// `last_processed_at` to `now`. Returns `None` when nothing is due, or
    /// when the due date was already booked by an earlier run.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `origin_id` does not refer to a valid
    ///   transaction,
    /// - [Error::ScheduleOutOfRange] if the schedule cannot be advanced,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn materialize_occurrence(
        &mut self,
        origin_id: DatabaseID,
        now: Date,
    ) -> Result<Option<Transaction>, Error>;
}
