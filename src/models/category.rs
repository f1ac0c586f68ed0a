//! Defines the category model, consumed read-only by the ledger.

use serde::{Deserialize, Serialize};

use crate::models::{DatabaseID, TransactionType};

/// Alias for the integer type used for category IDs.
pub type CategoryId = DatabaseID;

/// A label for grouping transactions.
///
/// A category's own type restricts which transactions may use it: an EXPENSE
/// transaction may not use an INCOME-only category. Categories are owned by an
/// external collaborator and the ledger never modifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID for the category.
    pub id: CategoryId,
    /// The display name of the category.
    pub name: String,
    /// The transaction type this category applies to.
    pub category_type: TransactionType,
}

/// The details needed to add a category, before it has an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    /// The display name of the category.
    pub name: String,
    /// The transaction type this category applies to.
    pub category_type: TransactionType,
}
