//! # Interchain Accounts
//!
//! Host-side account records and deterministic address derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Module name mixed into every derived address.
pub const MODULE_NAME: &str = "interchainaccounts";

/// Key scoping derived addresses to the host submodule.
pub const HOST_ACCOUNTS_KEY: &str = "icahost-accounts";

/// Account on the host chain controlled through an interchain accounts channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchainAccount {
    /// Derived address.
    pub address: String,
    /// Controller port that owns the account.
    pub account_owner: String,
}

/// Any account known to the host chain's account store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountRecord {
    /// Ordinary account.
    Base {
        /// Account address.
        address: String,
    },
    /// Interchain account.
    Interchain(InterchainAccount),
}

impl AccountRecord {
    /// Address of the account.
    pub fn address(&self) -> &str {
        match self {
            Self::Base { address } => address,
            Self::Interchain(account) => &account.address,
        }
    }

    /// Whether the record is an interchain account.
    pub fn is_interchain(&self) -> bool {
        matches!(self, Self::Interchain(_))
    }
}

/// Derive the interchain account address for a host connection and
/// controller port.
///
/// `address = prefix ++ hex(sha256(sha256(MODULE_NAME ++ HOST_ACCOUNTS_KEY) ++ connection_id ++ port_id))`
pub fn generate_address(prefix: &str, connection_id: &str, port_id: &str) -> String {
    let module_key = Sha256::new()
        .chain_update(MODULE_NAME.as_bytes())
        .chain_update(HOST_ACCOUNTS_KEY.as_bytes())
        .finalize();

    let derived = Sha256::new()
        .chain_update(module_key)
        .chain_update(connection_id.as_bytes())
        .chain_update(port_id.as_bytes())
        .finalize();

    format!("{}{}", prefix, hex::encode(derived))
}
