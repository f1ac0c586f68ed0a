//! Defines the category store trait.

use crate::{
    Error,
    models::{Category, CategoryId, NewCategory},
};

/// Resolves categories for the category/type cross-check.
///
/// Categories are owned by an external collaborator; the ledger consumes them
/// read-only. [CategoryStore::create] exists for that collaborator and for
/// tests.
pub trait CategoryStore {
    /// Create a new category in the store.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an unexpected SQL error.
    fn create(&mut self, new_category: NewCategory) -> Result<Category, Error>;

    /// Retrieve a category from the store by its `id`.
    ///
    /// # Errors
    /// Returns an [Error::NotFound] if `id` does not refer to a valid category.
    fn get(&self, id: CategoryId) -> Result<Category, Error>;
}
