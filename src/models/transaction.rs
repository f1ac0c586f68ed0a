//! This file defines the type `Transaction`, the core type of the ledger.

use std::{fmt, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, OffsetDateTime};

use crate::models::{AccountId, CategoryId, DatabaseID};

/// An invalid string was used where a transaction type was expected.
#[derive(Debug, PartialEq, Error)]
#[error("{0:?} is not a valid transaction type")]
pub struct ParseTransactionTypeError(String);

/// Whether a transaction puts money into an account or takes it out.
///
/// The sign of a transaction is carried by its type, the stored amount is
/// always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money earned, counts towards the account balance.
    Income,
    /// Money spent, counts against the account balance.
    Expense,
}

impl TransactionType {
    /// The canonical string representation used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }

    /// Apply the sign carried by the type: income is positive, expense negative.
    pub fn signed(&self, amount: f64) -> f64 {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseTransactionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            _ => Err(ParseTransactionTypeError(s.to_owned())),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// An invalid string was used where a recurring interval was expected.
#[derive(Debug, PartialEq, Error)]
#[error("{0:?} is not a valid recurring interval")]
pub struct ParseRecurringIntervalError(String);

/// How often a recurring transaction happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringInterval {
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// The same day of the month, every calendar month, clamped to the last
    /// valid day when the target month is shorter.
    Monthly,
    /// The same month and day every year, with Feb 29 clamped to Feb 28 on
    /// non-leap years.
    Yearly,
}

impl RecurringInterval {
    /// The canonical string representation used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringInterval::Daily => "DAILY",
            RecurringInterval::Weekly => "WEEKLY",
            RecurringInterval::Monthly => "MONTHLY",
            RecurringInterval::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for RecurringInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecurringInterval {
    type Err = ParseRecurringIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY" => Ok(RecurringInterval::Daily),
            "WEEKLY" => Ok(RecurringInterval::Weekly),
            "MONTHLY" => Ok(RecurringInterval::Monthly),
            "YEARLY" => Ok(RecurringInterval::Yearly),
            _ => Err(ParseRecurringIntervalError(s.to_owned())),
        }
    }
}

impl ToSql for RecurringInterval {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RecurringInterval {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// The schedule attached to a recurring transaction.
///
/// A transaction is recurring if and only if it carries one of these, so a
/// non-recurring transaction can never hold a stale interval or next
/// occurrence date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    /// How often the transaction repeats.
    pub interval: RecurringInterval,
    /// The date the next occurrence is due.
    pub next_occurrence_at: Date,
    /// The date the schedule was last advanced by the recurrence engine, or
    /// `None` if no occurrence has been materialized yet.
    pub last_processed_at: Option<Date>,
}

/// An expense or income, i.e. an event where money was either spent or earned
/// against an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// Whether this is money in or money out.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned, always strictly positive.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// An optional text description of what the transaction was for.
    pub description: Option<String>,
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// The category that describes the type of the transaction.
    pub category_id: CategoryId,
    /// The recurring schedule, if any.
    pub recurrence: Option<Recurrence>,
    /// For an occurrence materialized by the recurrence engine, the ID of the
    /// recurring transaction that generated it.
    pub origin_id: Option<DatabaseID>,
    /// When the row was inserted.
    pub created_at: OffsetDateTime,
    /// When the row was last modified.
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Whether the transaction repeats on a schedule.
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// The amount with the sign carried by the transaction type applied.
    pub fn signed_amount(&self) -> f64 {
        self.transaction_type.signed(self.amount)
    }
}

/// The details needed to add a transaction to the ledger, before it has an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Whether this is money in or money out.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned, always strictly positive.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// An optional text description of what the transaction was for.
    pub description: Option<String>,
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// The category that describes the type of the transaction.
    pub category_id: CategoryId,
    /// The recurring schedule, if any.
    pub recurrence: Option<Recurrence>,
    /// Set by the recurrence engine when materializing an occurrence.
    pub origin_id: Option<DatabaseID>,
}

impl NewTransaction {
    /// The amount with the sign carried by the transaction type applied.
    pub fn signed_amount(&self) -> f64 {
        self.transaction_type.signed(self.amount)
    }
}
