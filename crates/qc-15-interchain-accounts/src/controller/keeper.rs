//! # Controller Keeper
//!
//! Owns the controller-side registry and parameters and registers interchain
//! accounts. Handshake callbacks live in [`super::handshake`] and the packet
//! send path in [`super::relay`].

use crate::config::ControllerParams;
use crate::domain::{
    channel_capability_path, new_controller_port_id, port_path, ActiveChannel, Capability, ChannelEnd,
    ChannelId, IcaError, Metadata, Order, PortId, RegisteredInterchainAccount, HOST_PORT_ID,
};
use crate::ports::{CapabilityKeeper, ChannelKeeper, ChannelOpenInitRequest, KvStore, TimeSource};
use crate::registry::{ActiveChannelRegistry, RegistrySide};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Capability module name of the controller.
pub const CONTROLLER_SUBMODULE: &str = "icacontroller";

/// Controller-side keeper.
pub struct ControllerKeeper {
    pub(super) registry: ActiveChannelRegistry,
    pub(super) channels: Arc<dyn ChannelKeeper>,
    pub(super) capabilities: Arc<dyn CapabilityKeeper>,
    pub(super) time: Arc<dyn TimeSource>,
    params: RwLock<ControllerParams>,
}

impl ControllerKeeper {
    /// Create a keeper over the chain's state, transport, capability scope and clock.
    pub fn new(
        store: Arc<dyn KvStore>,
        channels: Arc<dyn ChannelKeeper>,
        capabilities: Arc<dyn CapabilityKeeper>,
        time: Arc<dyn TimeSource>,
        params: ControllerParams,
    ) -> Self {
        Self {
            registry: ActiveChannelRegistry::new(store, Arc::clone(&channels), RegistrySide::Controller),
            channels,
            capabilities,
            time,
            params: RwLock::new(params),
        }
    }

    // =========================================================================
    // PARAMETERS
    // =========================================================================

    /// Current parameters.
    pub fn params(&self) -> ControllerParams {
        self.params.read().clone()
    }

    /// Replace the parameters.
    pub fn set_params(&self, params: ControllerParams) {
        info!(controller_enabled = params.controller_enabled, "Controller params updated");
        *self.params.write() = params;
    }

    pub(super) fn ensure_enabled(&self) -> Result<(), IcaError> {
        if !self.params.read().controller_enabled {
            return Err(IcaError::ControllerDisabled);
        }
        Ok(())
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register an interchain account through the message entry point.
    ///
    /// Callbacks for the resulting channel are not forwarded to an underlying
    /// application.
    pub fn register_interchain_account(
        &self,
        connection_id: &str,
        owner: &str,
        version: &str,
        ordering: Order,
    ) -> Result<(PortId, ChannelId), IcaError> {
        self.register(connection_id, owner, version, ordering, false)
    }

    /// Register an interchain account on behalf of the application wrapped by
    /// the controller middleware. Callbacks for the resulting channel are
    /// forwarded to that application.
    pub fn register_interchain_account_with_middleware(
        &self,
        connection_id: &str,
        owner: &str,
        version: &str,
        ordering: Order,
    ) -> Result<(PortId, ChannelId), IcaError> {
        self.register(connection_id, owner, version, ordering, true)
    }

    fn register(
        &self,
        connection_id: &str,
        owner: &str,
        version: &str,
        ordering: Order,
        middleware_enabled: bool,
    ) -> Result<(PortId, ChannelId), IcaError> {
        self.ensure_enabled()?;
        let port_id = new_controller_port_id(owner)?;

        if !self.registry.has_port(&port_id)? {
            let capability = self.channels.bind_port(&port_id)?;
            self.capabilities
                .claim_capability(&capability, &port_path(&port_id))?;
            self.registry.set_port(&port_id)?;
            debug!(port_id = %port_id, "Controller port bound");
        }

        if let Some(channel_id) = self.registry.get_open_active_channel(connection_id, &port_id)? {
            return Err(IcaError::ActiveChannelAlreadySet {
                channel_id,
                port_id,
            });
        }

        // The open-init callback reads the flag, so it is written first and
        // put back if the handshake rejects.
        let previous_flag = self.middleware_flag(&port_id, connection_id)?;
        self.write_middleware_flag(&port_id, connection_id, Some(middleware_enabled))?;

        let channel_id = match self.channels.chan_open_init(ChannelOpenInitRequest {
            port_id: port_id.clone(),
            connection_hops: vec![connection_id.to_string()],
            counterparty_port_id: HOST_PORT_ID.to_string(),
            ordering,
            version: version.to_string(),
        }) {
            Ok(channel_id) => channel_id,
            Err(e) => {
                self.write_middleware_flag(&port_id, connection_id, previous_flag)?;
                return Err(e);
            }
        };

        info!(
            port_id = %port_id,
            connection_id,
            channel_id = %channel_id,
            middleware_enabled,
            "Interchain account registration started"
        );
        Ok((port_id, channel_id))
    }

    fn middleware_flag(&self, port_id: &str, connection_id: &str) -> Result<Option<bool>, IcaError> {
        if self.registry.is_middleware_enabled(port_id, connection_id)? {
            Ok(Some(true))
        } else if self.registry.is_middleware_disabled(port_id, connection_id)? {
            Ok(Some(false))
        } else {
            Ok(None)
        }
    }

    fn write_middleware_flag(
        &self,
        port_id: &str,
        connection_id: &str,
        flag: Option<bool>,
    ) -> Result<(), IcaError> {
        match flag {
            Some(true) => self.registry.set_middleware_enabled(port_id, connection_id),
            Some(false) => self.registry.set_middleware_disabled(port_id, connection_id),
            None => self.registry.clear_middleware_flag(port_id, connection_id),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Interchain account address of `owner` on `connection_id`.
    pub fn get_interchain_account_address(
        &self,
        owner: &str,
        connection_id: &str,
    ) -> Result<Option<String>, IcaError> {
        let port_id = new_controller_port_id(owner)?;
        self.registry
            .get_interchain_account_address(connection_id, &port_id)
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

    /// Whether the active channel of `(connection_id, port_id)` is CLOSED.
    pub fn is_active_channel_closed(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<bool, IcaError> {
        self.registry.is_active_channel_closed(connection_id, port_id)
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

    /// Every bound controller port.
    pub fn get_all_ports(&self) -> Result<Vec<String>, IcaError> {
        self.registry.get_all_ports()
    }

    /// Whether callbacks for `(port_id, connection_id)` go to the underlying application.
    pub fn is_middleware_enabled(&self, port_id: &str, connection_id: &str) -> Result<bool, IcaError> {
        self.registry.is_middleware_enabled(port_id, connection_id)
    }

    /// Negotiated version of a channel.
    pub fn get_app_version(&self, port_id: &str, channel_id: &str) -> Option<String> {
        self.channels
            .get_channel(port_id, channel_id)
            .map(|channel| channel.version)
    }

    /// Connection a channel runs over.
    pub fn get_connection_id(&self, port_id: &str, channel_id: &str) -> Result<String, IcaError> {
        let channel = self.require_channel(port_id, channel_id)?;
        channel
            .connection_id()
            .map(str::to_string)
            .ok_or_else(|| IcaError::InvalidRequest(format!("channel {} has no connection hops", channel_id)))
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
        let channel = self.require_channel(port_id, channel_id)?;
        Metadata::decode(&channel.version)
    }

    pub(super) fn authenticate_channel(
        &self,
        port_id: &str,
        channel_id: &str,
    ) -> Result<Capability, IcaError> {
        let path = channel_capability_path(port_id, channel_id);
        self.capabilities
            .get_capability(&path)
            .ok_or(IcaError::CapabilityNotFound(path))
    }
}
