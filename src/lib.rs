//! Ledgerkeep is the transaction ledger core of a personal-finance app.
//!
//! It validates transaction payloads against the domain rules, creates and
//! updates transactions atomically together with the owning account's cached
//! balance, and materializes the occurrences of recurring transactions on a
//! schedule.
//!
//! The crate is organised around four pieces:
//!
//! - [validation] checks a raw payload and collects every rule violation.
//! - [stores] owns transaction rows and account balances, with SQLite
//!   implementations under [stores::sqlite].
//! - [recurrence] computes next-occurrence dates and runs due schedules.
//! - [service] orchestrates the three for the entry points consumed by the
//!   UI layer.
//!
//! UI rendering, routing, authentication, and receipt OCR are external
//! collaborators; the receipt scanner in particular feeds its candidate
//! payloads through the same [validation::validate] as manual input.

#![warn(missing_docs)]

pub mod db;
mod error;
pub mod models;
pub mod recurrence;
pub mod service;
pub mod stores;
pub mod validation;

pub use db::initialize as initialize_db;
pub use error::Error;
