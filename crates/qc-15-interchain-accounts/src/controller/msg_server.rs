//! # Controller Messages
//!
//! Message entry points for owners that are not wrapped by the controller
//! middleware. Channels registered here never forward callbacks to an
//! underlying application.

use super::keeper::ControllerKeeper;
use crate::domain::{new_controller_port_id, ChannelId, IcaError, Order, PacketData, PortId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Register an interchain account for `owner` on `connection_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegisterInterchainAccount {
    /// Owner account on the controller chain.
    pub owner: String,
    /// Controller-side connection to the host.
    pub connection_id: String,
    /// Proposed metadata. Blank selects the defaults.
    #[serde(default)]
    pub version: String,
    /// Channel ordering.
    pub ordering: Order,
}

impl MsgRegisterInterchainAccount {
    /// Ordered registration with default metadata.
    pub fn new(owner: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            connection_id: connection_id.into(),
            version: String::new(),
            ordering: Order::Ordered,
        }
    }

    /// Stateless validation.
    pub fn validate_basic(&self) -> Result<(), IcaError> {
        validate_connection_id(&self.connection_id)?;
        new_controller_port_id(&self.owner)?;
        Ok(())
    }
}

/// Result of [`MsgRegisterInterchainAccount`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegisterInterchainAccountResponse {
    /// Channel whose handshake was started.
    pub channel_id: ChannelId,
    /// Controller port of the owner.
    pub port_id: PortId,
}

/// Send a transaction batch to the interchain account of `owner`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSendTx {
    /// Owner account on the controller chain.
    pub owner: String,
    /// Controller-side connection to the host.
    pub connection_id: String,
    /// Packet envelope.
    pub packet_data: PacketData,
    /// Timeout relative to the current block time, in nanoseconds.
    pub relative_timeout: u64,
}

impl MsgSendTx {
    /// Stateless validation.
    pub fn validate_basic(&self) -> Result<(), IcaError> {
        validate_connection_id(&self.connection_id)?;
        new_controller_port_id(&self.owner)?;
        if self.relative_timeout == 0 {
            return Err(IcaError::InvalidTimeoutTimestamp { timeout: 0, now: 0 });
        }
        self.packet_data.validate_basic()
    }
}

/// Result of [`MsgSendTx`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSendTxResponse {
    /// Sequence of the sent packet.
    pub sequence: u64,
}

fn validate_connection_id(connection_id: &str) -> Result<(), IcaError> {
    if connection_id.trim().is_empty() {
        return Err(IcaError::InvalidRequest("connection id cannot be blank".to_string()));
    }
    Ok(())
}

impl ControllerKeeper {
    /// Handle [`MsgRegisterInterchainAccount`].
    pub fn handle_register_interchain_account(
        &self,
        msg: &MsgRegisterInterchainAccount,
    ) -> Result<MsgRegisterInterchainAccountResponse, IcaError> {
        msg.validate_basic()?;
        let (port_id, channel_id) = self.register_interchain_account(
            &msg.connection_id,
            &msg.owner,
            &msg.version,
            msg.ordering,
        )?;
        Ok(MsgRegisterInterchainAccountResponse {
            channel_id,
            port_id,
        })
    }

    /// Handle [`MsgSendTx`].
    pub fn handle_send_tx(&self, msg: &MsgSendTx) -> Result<MsgSendTxResponse, IcaError> {
        msg.validate_basic()?;
        self.ensure_enabled()?;
        let port_id = new_controller_port_id(&msg.owner)?;

        let now = self.time.now_nanos();
        let timeout_timestamp = now
            .checked_add(msg.relative_timeout)
            .ok_or(IcaError::InvalidTimeoutTimestamp {
                timeout: u64::MAX,
                now,
            })?;
        debug!(port_id = %port_id, timeout_timestamp, "Resolved send timeout");

        let sequence = self.send_tx(&msg.connection_id, &port_id, &msg.packet_data, timeout_timestamp)?;
        Ok(MsgSendTxResponse { sequence })
    }
}
