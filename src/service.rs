//! Wires the validator, the stores and the recurrence engine into the
//! operations exposed to callers.
//!
//! Every entry point takes the caller's user ID, supplied by the
//! authentication layer sitting in front of this crate. Ownership checks
//! answer with [Error::NotFound] whether the resource is missing or belongs to
//! someone else, so a caller cannot probe for other users' data.

use time::Date;

use crate::{
    Error,
    models::{AccountId, DatabaseID, NewTransaction, Recurrence, Transaction, UserID},
    recurrence::{next_occurrence, run_due},
    stores::{AccountStore, CategoryStore, LedgerStore},
    validation::{FieldError, TransactionPayload, ValidTransaction, validate},
};

/// The result of a create or update, carrying the affected account's ID so the
/// caller can navigate straight to that account's view.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResponse {
    /// The transaction as persisted.
    pub transaction: Transaction,
    /// The account the transaction now belongs to.
    pub account_id: AccountId,
}

/// Coordinates transaction operations across the ledger, account and category
/// stores.
#[derive(Debug, Clone)]
pub struct TransactionService<L, A, C> {
    ledger: L,
    accounts: A,
    categories: C,
}

impl<L, A, C> TransactionService<L, A, C>
where
    L: LedgerStore,
    A: AccountStore,
    C: CategoryStore,
{
    /// Create a new service over the given stores.
    pub fn new(ledger: L, accounts: A, categories: C) -> Self {
        Self {
            ledger,
            accounts,
            categories,
        }
    }

    /// Validate `payload` and record it as a new transaction for `user_id`,
    /// adjusting the account balance atomically.
    ///
    /// For a recurring payload the schedule is initialized so the first
    /// occurrence falls one interval after the transaction date.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::Validation] if the payload violates any domain rule, or its
    ///   category is unknown or does not match the transaction type,
    /// - [Error::NotFound] if the account does not exist or belongs to another
    ///   user,
    /// - [Error::ScheduleOutOfRange] if the first occurrence cannot be
    ///   scheduled,
    /// - or [Error::SqlError] if there is some other SQL error.
    pub fn create_transaction(
        &mut self,
        user_id: UserID,
        payload: &TransactionPayload,
    ) -> Result<TransactionResponse, Error> {
        let valid = validate(payload).map_err(Error::Validation)?;
        self.authorize_account(user_id, valid.account_id)?;
        self.check_category(&valid)?;

        let recurrence = build_schedule(&valid, None)?;
        let transaction = self.ledger.create(NewTransaction {
            transaction_type: valid.transaction_type,
            amount: valid.amount,
            date: valid.date,
            description: valid.description,
            account_id: valid.account_id,
            category_id: valid.category_id,
            recurrence,
            origin_id: None,
        })?;

        Ok(TransactionResponse {
            account_id: transaction.account_id,
            transaction,
        })
    }

    /// Validate `payload` and replace the mutable fields of the transaction
    /// with `id`, applying the balance delta atomically.
    ///
    /// Moving the transaction to another account of the caller's removes the
    /// amount from the old account and applies it to the new one in the same
    /// step. Enabling recurrence recomputes the schedule from the new date and
    /// interval, preserving `last_processed_at`; disabling it clears the
    /// schedule and cancels future occurrences.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if the transaction or target account does not exist
    ///   or belongs to another user,
    /// - [Error::Validation] as for [Self::create_transaction],
    /// - [Error::ScheduleOutOfRange] if the next occurrence cannot be
    ///   scheduled,
    /// - or [Error::SqlError] if there is some other SQL error.
    pub fn update_transaction(
        &mut self,
        user_id: UserID,
        id: DatabaseID,
        payload: &TransactionPayload,
    ) -> Result<TransactionResponse, Error> {
        let existing = self.ledger.get(id)?;
        self.authorize_account(user_id, existing.account_id)?;

        let valid = validate(payload).map_err(Error::Validation)?;
        if valid.account_id != existing.account_id {
            self.authorize_account(user_id, valid.account_id)?;
        }
        self.check_category(&valid)?;

        let recurrence = build_schedule(&valid, existing.recurrence.as_ref())?;
        let transaction = self.ledger.update(
            id,
            NewTransaction {
                transaction_type: valid.transaction_type,
                amount: valid.amount,
                date: valid.date,
                description: valid.description,
                account_id: valid.account_id,
                category_id: valid.category_id,
                recurrence,
                // The link back to a generating transaction never changes.
                origin_id: existing.origin_id,
            },
        )?;

        Ok(TransactionResponse {
            account_id: transaction.account_id,
            transaction,
        })
    }

    /// Remove the transaction with `id`, reversing its amount from the account
    /// balance. Returns the affected account's ID.
    ///
    /// Deleting a recurring transaction cancels all of its future occurrences;
    /// occurrences already materialized stay in the ledger with their link to
    /// the deleted transaction cleared.
    ///
    /// # Errors
    /// Returns an [Error::NotFound] if the transaction does not exist or
    /// belongs to another user.
    pub fn delete_transaction(
        &mut self,
        user_id: UserID,
        id: DatabaseID,
    ) -> Result<AccountId, Error> {
        let existing = self.ledger.get(id)?;
        self.authorize_account(user_id, existing.account_id)?;

        let removed = self.ledger.delete(id)?;

        Ok(removed.account_id)
    }

    /// Retrieve the transactions of `account_id`, most recent first.
    ///
    /// # Errors
    /// Returns an [Error::NotFound] if the account does not exist or belongs
    /// to another user.
    pub fn list_by_account(
        &self,
        user_id: UserID,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, Error> {
        self.authorize_account(user_id, account_id)?;

        self.ledger.list_by_account(account_id)
    }

    /// Materialize every recurring occurrence due on or before `now`.
    ///
    /// Invoked periodically by the background worker; safe to re-run.
    ///
    /// # Errors
    /// Returns the first store error encountered.
    pub fn run_due(&mut self, now: Date) -> Result<Vec<DatabaseID>, Error> {
        run_due(&mut self.ledger, now)
    }

    fn authorize_account(&self, user_id: UserID, account_id: AccountId) -> Result<(), Error> {
        let account = self.accounts.get(account_id)?;

        // A foreign account must look exactly like a missing one.
        if account.user_id != user_id {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    fn check_category(&self, valid: &ValidTransaction) -> Result<(), Error> {
        match self.categories.get(valid.category_id) {
            Ok(category) if category.category_type == valid.transaction_type => Ok(()),
            Ok(_) => Err(Error::Validation(vec![FieldError::new(
                "category",
                "Category type must match the transaction type",
            )])),
            Err(Error::NotFound) => Err(Error::Validation(vec![FieldError::new(
                "category",
                "Unknown category",
            )])),
            Err(error) => Err(error),
        }
    }
}

/// The schedule to persist for a validated payload: one interval past the
/// transaction date when recurring, `None` otherwise.
fn build_schedule(
    valid: &ValidTransaction,
    existing: Option<&Recurrence>,
) -> Result<Option<Recurrence>, Error> {
    let Some(interval) = valid.recurring_interval else {
        return Ok(None);
    };

    Ok(Some(Recurrence {
        interval,
        next_occurrence_at: next_occurrence(valid.date, interval)?,
        last_processed_at: existing.and_then(|recurrence| recurrence.last_processed_at),
    }))
}
