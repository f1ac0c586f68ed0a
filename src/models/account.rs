//! Defines the account model, the aggregate that owns a cached balance.

use std::{fmt, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DatabaseID, UserID};

/// Alias for the integer type used for account IDs.
pub type AccountId = DatabaseID;

/// An invalid string was used where an account type was expected.
#[derive(Debug, PartialEq, Error)]
#[error("{0:?} is not a valid account type")]
pub struct ParseAccountTypeError(String);

/// The kind of bank account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// An everyday checking account.
    Current,
    /// A savings account.
    Savings,
}

impl AccountType {
    /// The canonical string representation used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Current => "CURRENT",
            AccountType::Savings => "SAVINGS",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = ParseAccountTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CURRENT" => Ok(AccountType::Current),
            "SAVINGS" => Ok(AccountType::Savings),
            _ => Err(ParseAccountTypeError(s.to_owned())),
        }
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// A bank account against which transactions are recorded.
///
/// The cached `balance` always equals the signed sum of the account's live
/// transactions (income positive, expense negative). Ledger mutations maintain
/// it in the same database transaction as the row change, so it is never
/// recomputed by scanning on the hot path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The ID for the account.
    pub id: AccountId,
    /// The display name of the account.
    pub name: String,
    /// The kind of bank account.
    pub account_type: AccountType,
    /// The cached balance.
    pub balance: f64,
    /// Whether this is the owner's default account. At most one account per
    /// owner may have this set.
    pub is_default: bool,
    /// The ID of the owner of the account.
    pub user_id: UserID,
}

/// The details needed to add an account, before it has an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// The display name of the account.
    pub name: String,
    /// The kind of bank account.
    pub account_type: AccountType,
    /// The starting balance.
    pub balance: f64,
    /// Whether this should become the owner's default account.
    pub is_default: bool,
    /// The ID of the owner of the account.
    pub user_id: UserID,
}
