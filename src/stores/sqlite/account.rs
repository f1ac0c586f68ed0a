//! Implements a SQLite backed account store.
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};

use crate::{
    Error,
    db::{CreateTable, MapRow},
    models::{Account, AccountId, NewAccount},
    stores::AccountStore,
};

/// Stores accounts in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteAccountStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteAccountStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl CreateTable for SQLiteAccountStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS account (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    account_type TEXT NOT NULL,
                    balance REAL NOT NULL,
                    is_default INTEGER NOT NULL DEFAULT 0,
                    user_id INTEGER NOT NULL
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteAccountStore {
    type ReturnType = Account;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        Ok(Account {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            account_type: row.get(offset + 2)?,
            balance: row.get(offset + 3)?,
            is_default: row.get(offset + 4)?,
            user_id: row.get(offset + 5)?,
        })
    }
}

impl AccountStore for SQLiteAccountStore {
    /// Create a new account in the database.
    ///
    /// Clears the default flag on the owner's previous default account when
    /// `new_account.is_default` is set, in the same SQL transaction as the
    /// insert.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an unexpected SQL error.
    fn create(&mut self, new_account: NewAccount) -> Result<Account, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;
        let tx = connection.unchecked_transaction()?;

        if new_account.is_default {
            tx.execute(
                "UPDATE account SET is_default = 0 WHERE user_id = ?1 AND is_default = 1",
                [new_account.user_id],
            )?;
        }

        let account = tx
            .prepare(
                "INSERT INTO account (name, account_type, balance, is_default, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id, name, account_type, balance, is_default, user_id",
            )?
            .query_row(
                (
                    &new_account.name,
                    new_account.account_type,
                    new_account.balance,
                    new_account.is_default,
                    new_account.user_id,
                ),
                Self::map_row,
            )?;

        tx.commit()?;

        Ok(account)
    }

    /// Retrieve an account in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid account,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, id: AccountId) -> Result<Account, Error> {
        let account = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLock)?
            .prepare(
                "SELECT id, name, account_type, balance, is_default, user_id
                 FROM account WHERE id = :id",
            )?
            .query_row(&[(":id", &id)], Self::map_row)?;

        Ok(account)
    }
}
