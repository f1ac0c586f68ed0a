//! SQLite backed implementations of the store traits.

mod account;
mod category;
mod transaction;

pub use account::SQLiteAccountStore;
pub use category::SQLiteCategoryStore;
pub use transaction::{BalanceDrift, SQLiteLedgerStore};
