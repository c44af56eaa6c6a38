//! # Host Keeper
//!
//! Owns the host-side registry, parameters and account creation. Registry
//! keys on the host are `(host connection, controller port)`; every channel
//! lives on the host port.

use crate::config::HostParams;
use crate::domain::{
    generate_address, AccountRecord, ActiveChannel, ChannelEnd, ChannelId, IcaError,
    InterchainAccount, Metadata, PortId, RegisteredInterchainAccount,
};
use crate::ports::{AccountKeeper, CapabilityKeeper, ChannelKeeper, KvStore, MessageRouter};
use crate::registry::{ActiveChannelRegistry, RegistrySide};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Capability module name of the host.
pub const HOST_SUBMODULE: &str = "icahost";

/// Host-side keeper.
pub struct HostKeeper {
    pub(super) store: Arc<dyn KvStore>,
    pub(super) registry: ActiveChannelRegistry,
    pub(super) channels: Arc<dyn ChannelKeeper>,
    pub(super) capabilities: Arc<dyn CapabilityKeeper>,
    pub(super) accounts: Arc<dyn AccountKeeper>,
    pub(super) router: Arc<dyn MessageRouter>,
    params: RwLock<HostParams>,
    address_prefix: String,
    /// `(port, channel)` pairs whose packet receipt is executing.
    pub(super) executing: Mutex<HashSet<(PortId, ChannelId)>>,
}

impl HostKeeper {
    /// Create a keeper over the chain's state and collaborators.
    pub fn new(
        store: Arc<dyn KvStore>,
        channels: Arc<dyn ChannelKeeper>,
        capabilities: Arc<dyn CapabilityKeeper>,
        accounts: Arc<dyn AccountKeeper>,
        router: Arc<dyn MessageRouter>,
        params: HostParams,
        address_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry: ActiveChannelRegistry::new(
                Arc::clone(&store),
                Arc::clone(&channels),
                RegistrySide::Host,
            ),
            store,
            channels,
            capabilities,
            accounts,
            router,
            params: RwLock::new(params),
            address_prefix: address_prefix.into(),
            executing: Mutex::new(HashSet::new()),
        }
    }

    // =========================================================================
    // PARAMETERS
    // =========================================================================

    /// Current parameters.
    pub fn params(&self) -> HostParams {
        self.params.read().clone()
    }

    /// Replace the parameters after validating them.
    pub fn set_params(&self, params: HostParams) -> Result<(), IcaError> {
        params.validate()?;
        info!(
            host_enabled = params.host_enabled,
            allow_messages = params.allow_messages.len(),
            "Host params updated"
        );
        *self.params.write() = params;
        Ok(())
    }

    /// Whether the host is enabled.
    pub fn is_enabled(&self) -> bool {
        self.params.read().host_enabled
    }

    pub(super) fn ensure_enabled(&self) -> Result<(), IcaError> {
        if !self.is_enabled() {
            return Err(IcaError::HostDisabled);
        }
        Ok(())
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    /// Create the interchain account for `(connection_id, port_id)` and record
    /// its address.
    pub(super) fn create_interchain_account(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<String, IcaError> {
        let address = generate_address(&self.address_prefix, connection_id, port_id);
        if self.accounts.get_account(&address).is_some() {
            return Err(IcaError::AccountAlreadyExists(address));
        }

        self.accounts
            .set_account(AccountRecord::Interchain(InterchainAccount {
                address: address.clone(),
                account_owner: port_id.to_string(),
            }))?;
        self.registry
            .set_interchain_account_address(connection_id, port_id, &address)?;

        info!(
            connection_id,
            port_id,
            address = %address,
            "Interchain account created"
        );
        Ok(address)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Interchain account address for `(connection_id, port_id)`.
    pub fn get_interchain_account_address(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<Option<String>, IcaError> {
        self.registry
            .get_interchain_account_address(connection_id, port_id)
    }

    /// Active channel of `(connection_id, port_id)`, whatever its state.
    pub fn get_active_channel_id(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<Option<ChannelId>, IcaError> {
        self.registry.get_active_channel_id(connection_id, port_id)
    }

    /// Active channel of `(connection_id, port_id)` if it is OPEN.
    pub fn get_open_active_channel(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<Option<ChannelId>, IcaError> {
        self.registry.get_open_active_channel(connection_id, port_id)
    }

    /// Every active channel pointer.
    pub fn get_all_active_channels(&self) -> Result<Vec<ActiveChannel>, IcaError> {
        self.registry.get_all_active_channels()
    }

    /// Every registered interchain account.
    pub fn get_all_interchain_accounts(
        &self,
    ) -> Result<Vec<RegisteredInterchainAccount>, IcaError> {
        self.registry.get_all_interchain_accounts()
    }

    /// Negotiated version of a channel.
    pub fn get_app_version(&self, port_id: &str, channel_id: &str) -> Option<String> {
        self.channels
            .get_channel(port_id, channel_id)
            .map(|channel| channel.version)
    }

    pub(super) fn require_channel(&self, port_id: &str, channel_id: &str) -> Result<ChannelEnd, IcaError> {
        self.channels
            .get_channel(port_id, channel_id)
            .ok_or_else(|| IcaError::ChannelNotFound {
                port_id: port_id.to_string(),
                channel_id: channel_id.to_string(),
            })
    }

    pub(super) fn app_metadata(&self, port_id: &str, channel_id: &str) -> Result<Metadata, IcaError> {
        Metadata::decode(&self.require_channel(port_id, channel_id)?.version)
    }
}
