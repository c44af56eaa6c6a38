//! # Domain Entities
//!
//! Transport-owned records the subsystem reads, and the registry rows it
//! exposes to queries.

use super::value_objects::{ChannelId, ChannelState, ConnectionId, Counterparty, Order, PortId};
use serde::{Deserialize, Serialize};

/// A channel end as stored by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEnd {
    /// Current handshake state.
    pub state: ChannelState,
    /// Delivery ordering.
    pub ordering: Order,
    /// Counterparty end.
    pub counterparty: Counterparty,
    /// Connections the channel runs over. Always exactly one here.
    pub connection_hops: Vec<ConnectionId>,
    /// Negotiated application version (encoded metadata).
    pub version: String,
}

impl ChannelEnd {
    /// First connection hop, if any.
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_hops.first().map(String::as_str)
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }
}

/// A connection end as stored by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEnd {
    /// Light client tracking the counterparty chain.
    pub client_id: String,
    /// Connection identifier on the counterparty chain.
    pub counterparty_connection_id: ConnectionId,
}

/// A packet in flight between two channel ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Sequence number on the sending end.
    pub sequence: u64,
    /// Sending port.
    pub source_port: PortId,
    /// Sending channel.
    pub source_channel: ChannelId,
    /// Receiving port.
    pub destination_port: PortId,
    /// Receiving channel.
    pub destination_channel: ChannelId,
    /// Application payload.
    pub data: Vec<u8>,
    /// Deadline in nanoseconds on the receiving chain's clock.
    pub timeout_timestamp: u64,
}

/// Registry row describing the active channel of an owner/connection pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChannel {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Port identifier.
    pub port_id: PortId,
    /// Channel currently designated as active.
    pub channel_id: ChannelId,
    /// Whether callbacks are forwarded to an underlying application.
    pub is_middleware_enabled: bool,
}

/// Registry row describing a registered interchain account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredInterchainAccount {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Controller port identifier.
    pub port_id: PortId,
    /// Account address on the host chain.
    pub account_address: String,
}
