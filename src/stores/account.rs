//! Defines the account store trait.

use crate::{
    Error,
    models::{Account, AccountId, NewAccount},
};

/// Resolves accounts for ownership and balance lookups.
///
/// Account creation belongs to the external account-management collaborator;
/// [AccountStore::create] exists for that collaborator and for tests. The
/// ledger itself only ever adjusts balances through its own atomic mutations.
pub trait AccountStore {
    /// Create a new account in the store.
    ///
    /// If `new_account.is_default` is set, any existing default account for
    /// the same owner loses its default flag so that at most one default
    /// exists per owner.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if there is an unexpected SQL error.
    fn create(&mut self, new_account: NewAccount) -> Result<Account, Error>;

    /// Retrieve an account from the store by its `id`.
    ///
    /// # Errors
    /// Returns an [Error::NotFound] if `id` does not refer to a valid account.
    fn get(&self, id: AccountId) -> Result<Account, Error>;
}
