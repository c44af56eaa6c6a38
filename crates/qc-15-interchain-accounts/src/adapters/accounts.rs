//! In-memory account store.

use crate::domain::{AccountRecord, IcaError};
use crate::ports::AccountKeeper;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Account store backed by a map.
#[derive(Default)]
pub struct InMemoryAccountKeeper {
    accounts: RwLock<HashMap<String, AccountRecord>>,
}

impl InMemoryAccountKeeper {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Whether no account exists.
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl AccountKeeper for InMemoryAccountKeeper {
    fn get_account(&self, address: &str) -> Option<AccountRecord> {
        self.accounts.read().get(address).cloned()
    }

    fn set_account(&self, account: AccountRecord) -> Result<(), IcaError> {
        self.accounts
            .write()
            .insert(account.address().to_string(), account);
        Ok(())
    }
}
