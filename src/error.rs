//! Defines the app level error type.

use time::Date;

use crate::validation::FieldError;

/// The errors that may occur in the ledger.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The transaction payload failed domain validation.
    ///
    /// Every violated rule is collected so the caller can surface each field
    /// error next to the corresponding form field in one pass.
    #[error("the transaction payload failed validation")]
    Validation(Vec<FieldError>),

    /// The requested resource was not found, or is not owned by the caller.
    ///
    /// The two cases are deliberately indistinguishable so the server does not
    /// reveal whether a resource belonging to another user exists.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The operation lost a race with a concurrent mutation on the shared
    /// store. The caller may retry.
    #[error("the operation conflicted with a concurrent change")]
    Conflict,

    /// Advancing a recurrence schedule produced a date outside the supported
    /// calendar range.
    #[error("there is no valid occurrence date after {0}")]
    ScheduleOutOfRange(Date),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == rusqlite::ErrorCode::DatabaseBusy
                    || sql_error.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Error::Conflict
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
