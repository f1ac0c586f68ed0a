//! Implements a SQLite backed category store.
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};

use crate::{
    Error,
    db::{CreateTable, MapRow},
    models::{Category, CategoryId, NewCategory},
    stores::CategoryStore,
};

/// Stores categories in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteCategoryStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteCategoryStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl CreateTable for SQLiteCategoryStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS category (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    category_type TEXT NOT NULL
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteCategoryStore {
    type ReturnType = Category;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        Ok(Category {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            category_type: row.get(offset + 2)?,
        })
    }
}

impl CategoryStore for SQLiteCategoryStore {
    /// Create a new category in the database.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an unexpected SQL error.
    fn create(&mut self, new_category: NewCategory) -> Result<Category, Error> {
        let category = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLock)?
            .prepare(
                "INSERT INTO category (name, category_type)
                 VALUES (?1, ?2)
                 RETURNING id, name, category_type",
            )?
            .query_row(
                (&new_category.name, new_category.category_type),
                Self::map_row,
            )?;

        Ok(category)
    }

    /// Retrieve a category in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid category,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, id: CategoryId) -> Result<Category, Error> {
        let category = self
            .connection
            .lock()
            .map_err(|_| Error::DatabaseLock)?
            .prepare("SELECT id, name, category_type FROM category WHERE id = :id")?
            .query_row(&[(":id", &id)], Self::map_row)?;

        Ok(category)
    }
}
