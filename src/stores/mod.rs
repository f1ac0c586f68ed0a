//! Contains traits and implementations for objects that store the domain [models](crate::models).

mod account;
mod category;
mod transaction;

pub mod sqlite;

pub use account::AccountStore;
pub use category::CategoryStore;
pub use transaction::LedgerStore;
