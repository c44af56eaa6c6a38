//! # Active Channel Registry
//!
//! Persistent bookkeeping keyed by `(connection_id, port_id)`:
//!
//! | Key | Value |
//! |-----|-------|
//! | `activeChannel/{port}/{connection}` | active channel id |
//! | `owner/{port}/{connection}` | interchain account address |
//! | `isMiddlewareEnabled/{port}/{connection}` | `0x01` enabled, `0x00` disabled |
//! | `port/{port}` | `0x01` once the port is bound |
//!
//! Entries are never deleted. Re-opening a channel overwrites the active
//! channel pointer; handshake callbacks verify the previous channel is CLOSED
//! before doing so.
//!
//! On the controller the key port is also the local channel port. On the host
//! the key port is the counterparty (controller) port and channels live on the
//! host port.

use crate::domain::{
    ActiveChannel, ChannelEnd, ChannelId, ChannelState, IcaError, RegisteredInterchainAccount,
    HOST_PORT_ID,
};
use crate::ports::{ChannelKeeper, KvStore};
use std::sync::Arc;

/// Prefix of active channel keys.
pub const ACTIVE_CHANNEL_KEY_PREFIX: &str = "activeChannel";
/// Prefix of account address keys.
pub const OWNER_KEY_PREFIX: &str = "owner";
/// Prefix of middleware flag keys.
pub const IS_MIDDLEWARE_ENABLED_PREFIX: &str = "isMiddlewareEnabled";
/// Prefix of bound port keys.
pub const PORT_KEY_PREFIX: &str = "port";

const MIDDLEWARE_ENABLED: &[u8] = &[0x01];
const MIDDLEWARE_DISABLED: &[u8] = &[0x00];

/// Which chain the registry serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrySide {
    /// Channels live on the key port.
    Controller,
    /// Channels live on the host port.
    Host,
}

/// Build the active channel key.
pub fn key_active_channel(port_id: &str, connection_id: &str) -> String {
    format!("{}/{}/{}", ACTIVE_CHANNEL_KEY_PREFIX, port_id, connection_id)
}

/// Build the account address key.
pub fn key_owner_account(port_id: &str, connection_id: &str) -> String {
    format!("{}/{}/{}", OWNER_KEY_PREFIX, port_id, connection_id)
}

/// Build the middleware flag key.
pub fn key_is_middleware_enabled(port_id: &str, connection_id: &str) -> String {
    format!("{}/{}/{}", IS_MIDDLEWARE_ENABLED_PREFIX, port_id, connection_id)
}

/// Build the bound port key.
pub fn key_port(port_id: &str) -> String {
    format!("{}/{}", PORT_KEY_PREFIX, port_id)
}

/// Split `prefix/{port}/{connection}` into `(port, connection)`.
fn parse_pair_key(key: &[u8], prefix: &str) -> Result<(String, String), IcaError> {
    let key = utf8(key.to_vec())?;
    let rest = key
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('/'))
        .ok_or_else(|| IcaError::Store(format!("malformed registry key {}", key)))?;
    let (port, connection) = rest
        .rsplit_once('/')
        .ok_or_else(|| IcaError::Store(format!("malformed registry key {}", key)))?;
    Ok((port.to_string(), connection.to_string()))
}

fn utf8(bytes: Vec<u8>) -> Result<String, IcaError> {
    String::from_utf8(bytes).map_err(|e| IcaError::Store(format!("non utf-8 value: {}", e)))
}

/// Active channel registry for one side of the protocol.
pub struct ActiveChannelRegistry {
    store: Arc<dyn KvStore>,
    channels: Arc<dyn ChannelKeeper>,
    side: RegistrySide,
}

impl ActiveChannelRegistry {
    /// Create a registry over `store`, resolving channels through `channels`.
    pub fn new(store: Arc<dyn KvStore>, channels: Arc<dyn ChannelKeeper>, side: RegistrySide) -> Self {
        Self {
            store,
            channels,
            side,
        }
    }

    /// Side served by the registry.
    pub fn side(&self) -> RegistrySide {
        self.side
    }

    fn channel_port<'a>(&self, key_port: &'a str) -> &'a str {
        match self.side {
            RegistrySide::Controller => key_port,
            RegistrySide::Host => HOST_PORT_ID,
        }
    }

    // =========================================================================
    // ACTIVE CHANNELS
    // =========================================================================

    /// Active channel id, whatever its state.
    pub fn get_active_channel_id(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<Option<ChannelId>, IcaError> {
        self.store
            .get(key_active_channel(port_id, connection_id).as_bytes())?
            .map(utf8)
            .transpose()
    }

    /// Active channel id, only if the channel is OPEN.
    pub fn get_open_active_channel(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<Option<ChannelId>, IcaError> {
        let Some(channel_id) = self.get_active_channel_id(connection_id, port_id)? else {
            return Ok(None);
        };

        match self.channels.get_channel(self.channel_port(port_id), &channel_id) {
            Some(channel) if channel.state == ChannelState::Open => Ok(Some(channel_id)),
            _ => Ok(None),
        }
    }

    /// Active channel id together with its channel end.
    ///
    /// A pointer to a channel the transport does not know is an
    /// [`IcaError::InvariantViolation`].
    pub fn get_active_channel_end(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<Option<(ChannelId, ChannelEnd)>, IcaError> {
        let Some(channel_id) = self.get_active_channel_id(connection_id, port_id)? else {
            return Ok(None);
        };

        let channel = self
            .channels
            .get_channel(self.channel_port(port_id), &channel_id)
            .ok_or_else(|| {
                IcaError::InvariantViolation(format!(
                    "active channel mapping set for {} but channel does not exist in channel store",
                    channel_id
                ))
            })?;

        Ok(Some((channel_id, channel)))
    }

    /// Whether the active channel exists and is CLOSED.
    pub fn is_active_channel_closed(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<bool, IcaError> {
        let Some(channel_id) = self.get_active_channel_id(connection_id, port_id)? else {
            return Ok(false);
        };

        Ok(self
            .channels
            .get_channel(self.channel_port(port_id), &channel_id)
            .is_some_and(|channel| channel.is_closed()))
    }

    /// Whether an active channel pointer exists.
    pub fn is_active_channel(&self, connection_id: &str, port_id: &str) -> Result<bool, IcaError> {
        Ok(self.get_active_channel_id(connection_id, port_id)?.is_some())
    }

    /// Point the key at `channel_id`, replacing any previous pointer.
    pub fn set_active_channel_id(
        &self,
        connection_id: &str,
        port_id: &str,
        channel_id: &str,
    ) -> Result<(), IcaError> {
        self.store.set(
            key_active_channel(port_id, connection_id).as_bytes(),
            channel_id.as_bytes(),
        )
    }

    /// Every active channel pointer.
    pub fn get_all_active_channels(&self) -> Result<Vec<ActiveChannel>, IcaError> {
        let prefix = format!("{}/", ACTIVE_CHANNEL_KEY_PREFIX);
        self.store
            .prefix_scan(prefix.as_bytes())?
            .into_iter()
            .map(|(key, value)| {
                let (port_id, connection_id) = parse_pair_key(&key, ACTIVE_CHANNEL_KEY_PREFIX)?;
                let is_middleware_enabled = self.is_middleware_enabled(&port_id, &connection_id)?;
                Ok(ActiveChannel {
                    channel_id: utf8(value)?,
                    connection_id,
                    port_id,
                    is_middleware_enabled,
                })
            })
            .collect()
    }

    // =========================================================================
    // ACCOUNT ADDRESSES
    // =========================================================================

    /// Registered interchain account address.
    pub fn get_interchain_account_address(
        &self,
        connection_id: &str,
        port_id: &str,
    ) -> Result<Option<String>, IcaError> {
        self.store
            .get(key_owner_account(port_id, connection_id).as_bytes())?
            .map(utf8)
            .transpose()
    }

    /// Record the interchain account address.
    pub fn set_interchain_account_address(
        &self,
        connection_id: &str,
        port_id: &str,
        address: &str,
    ) -> Result<(), IcaError> {
        self.store.set(
            key_owner_account(port_id, connection_id).as_bytes(),
            address.as_bytes(),
        )
    }

    /// Every registered interchain account.
    pub fn get_all_interchain_accounts(
        &self,
    ) -> Result<Vec<RegisteredInterchainAccount>, IcaError> {
        let prefix = format!("{}/", OWNER_KEY_PREFIX);
        self.store
            .prefix_scan(prefix.as_bytes())?
            .into_iter()
            .map(|(key, value)| {
                let (port_id, connection_id) = parse_pair_key(&key, OWNER_KEY_PREFIX)?;
                Ok(RegisteredInterchainAccount {
                    connection_id,
                    port_id,
                    account_address: utf8(value)?,
                })
            })
            .collect()
    }

    // =========================================================================
    // MIDDLEWARE FLAG
    // =========================================================================

    /// Forward callbacks for the key to the underlying application.
    pub fn set_middleware_enabled(&self, port_id: &str, connection_id: &str) -> Result<(), IcaError> {
        self.store.set(
            key_is_middleware_enabled(port_id, connection_id).as_bytes(),
            MIDDLEWARE_ENABLED,
        )
    }

    /// Stop forwarding callbacks for the key.
    pub fn set_middleware_disabled(&self, port_id: &str, connection_id: &str) -> Result<(), IcaError> {
        self.store.set(
            key_is_middleware_enabled(port_id, connection_id).as_bytes(),
            MIDDLEWARE_DISABLED,
        )
    }

    /// Remove the flag, leaving the key neither enabled nor disabled.
    pub fn clear_middleware_flag(&self, port_id: &str, connection_id: &str) -> Result<(), IcaError> {
        self.store
            .delete(key_is_middleware_enabled(port_id, connection_id).as_bytes())
    }

    /// Whether callbacks are forwarded for the key.
    pub fn is_middleware_enabled(&self, port_id: &str, connection_id: &str) -> Result<bool, IcaError> {
        Ok(self
            .store
            .get(key_is_middleware_enabled(port_id, connection_id).as_bytes())?
            .is_some_and(|v| v == MIDDLEWARE_ENABLED))
    }

    /// Whether forwarding has been explicitly disabled for the key.
    pub fn is_middleware_disabled(&self, port_id: &str, connection_id: &str) -> Result<bool, IcaError> {
        Ok(self
            .store
            .get(key_is_middleware_enabled(port_id, connection_id).as_bytes())?
            .is_some_and(|v| v == MIDDLEWARE_DISABLED))
    }

    // =========================================================================
    // PORTS
    // =========================================================================

    /// Record a bound port.
    pub fn set_port(&self, port_id: &str) -> Result<(), IcaError> {
        self.store.set(key_port(port_id).as_bytes(), &[0x01])
    }

    /// Whether the port has been recorded.
    pub fn has_port(&self, port_id: &str) -> Result<bool, IcaError> {
        self.store.has(key_port(port_id).as_bytes())
    }

    /// Every recorded port.
    pub fn get_all_ports(&self) -> Result<Vec<String>, IcaError> {
        let prefix = format!("{}/", PORT_KEY_PREFIX);
        self.store
            .prefix_scan(prefix.as_bytes())?
            .into_iter()
            .map(|(key, _)| {
                let key = utf8(key)?;
                Ok(key[prefix.len()..].to_string())
            })
            .collect()
    }
}
