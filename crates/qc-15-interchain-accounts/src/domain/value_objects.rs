//! # Value Objects
//!
//! Identifiers, protocol constants and small immutable types shared by the
//! controller and host sides.

use super::errors::IcaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port identifier.
pub type PortId = String;

/// Channel identifier, assigned by the transport.
pub type ChannelId = String;

/// Connection identifier, assigned by the transport.
pub type ConnectionId = String;

// =============================================================================
// PROTOCOL CONSTANTS
// =============================================================================

/// Protocol version tag carried in every channel version string.
pub const VERSION: &str = "ics27-1";

/// Prefix of every controller-side port identifier.
pub const CONTROLLER_PORT_PREFIX: &str = "icacontroller-";

/// Well-known host-side port identifier.
pub const HOST_PORT_ID: &str = "icahost";

/// Maximum number of characters in a packet memo.
pub const MAX_MEMO_CHAR_LENGTH: usize = 256;

/// Maximum length of an interchain account address.
pub const DEFAULT_MAX_ADDR_LENGTH: usize = 128;

/// Maximum length of an owner identifier, in bytes.
pub const MAX_OWNER_LENGTH: usize = 2048;

/// Wildcard entry in the host allow-list.
pub const ALLOW_ALL_HOST_MSGS: &str = "*";

/// Build the capability path for a port.
pub fn port_path(port_id: &str) -> String {
    format!("ports/{}", port_id)
}

/// Build the capability path for a channel.
pub fn channel_capability_path(port_id: &str, channel_id: &str) -> String {
    format!("capabilities/ports/{}/channels/{}", port_id, channel_id)
}

// =============================================================================
// CHANNEL ENUMS
// =============================================================================

/// Channel ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// Packets delivered in sequence order; a timeout closes the channel.
    Ordered,
    /// Packets delivered in any order.
    Unordered,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordered => write!(f, "ORDER_ORDERED"),
            Self::Unordered => write!(f, "ORDER_UNORDERED"),
        }
    }
}

/// Channel state as reported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelState {
    /// Open-init has been processed.
    Init,
    /// Open-try has been processed.
    TryOpen,
    /// Handshake completed.
    Open,
    /// Closed by timeout or close handshake.
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "STATE_INIT"),
            Self::TryOpen => write!(f, "STATE_TRYOPEN"),
            Self::Open => write!(f, "STATE_OPEN"),
            Self::Closed => write!(f, "STATE_CLOSED"),
        }
    }
}

/// Counterparty end of a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    /// Counterparty port identifier.
    pub port_id: PortId,
    /// Counterparty channel identifier, unknown until open-try.
    pub channel_id: Option<ChannelId>,
}

impl Counterparty {
    /// Create a counterparty reference.
    pub fn new(port_id: impl Into<PortId>, channel_id: Option<ChannelId>) -> Self {
        Self {
            port_id: port_id.into(),
            channel_id,
        }
    }
}

/// Opaque object-capability token proving exclusive access to a port or channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    /// Globally unique index.
    pub index: u64,
}

// =============================================================================
// METADATA ENUMERATIONS
// =============================================================================

/// Supported transaction batch encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Compact binary encoding.
    Bincode,
    /// Canonical JSON encoding.
    Json,
}

impl Encoding {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bincode => "bincode",
            Self::Json => "json",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Result<Self, IcaError> {
        match value {
            "bincode" => Ok(Self::Bincode),
            "json" => Ok(Self::Json),
            other => Err(IcaError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported transaction batch types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxType {
    /// Ordered list of arbitrary messages.
    MultiMsg,
}

impl TxType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiMsg => "sdk_multi_msg",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Result<Self, IcaError> {
        match value {
            "sdk_multi_msg" => Ok(Self::MultiMsg),
            other => Err(IcaError::UnsupportedTxType(other.to_string())),
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
