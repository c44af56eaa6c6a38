//! # Domain Errors
//!
//! Error types for the Interchain Accounts subsystem.
//!
//! Errors fall into the following groups:
//!
//! | Group | Variants | Surfaced as |
//! |-------|----------|-------------|
//! | Protocol violation | `InvalidChannelFlow`, `InvalidChannelOrdering`, `InvalidControllerPort`, `InvalidHostPort`, `InvalidRequest` | handshake rejection |
//! | Version / metadata | `InvalidVersion`, `UnsupportedEncoding`, `UnsupportedTxType`, `InvalidConnection`, `InvalidAccountAddress` | handshake rejection |
//! | Registry conflict | `ActiveChannelAlreadySet`, `ActiveChannelNotFound` | handshake / send rejection |
//! | Authorization | `Unauthorized`, `InterchainAccountNotFound` | error acknowledgement |
//! | Decode | `InvalidType`, `InvalidPacketData`, `UnknownDataType` | error acknowledgement |
//! | Fatal | `InvariantViolation` | abort enclosing batch |

use thiserror::Error;

/// Interchain accounts error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IcaError {
    /// Handshake step attempted on the wrong chain.
    #[error("Invalid channel flow: {0}")]
    InvalidChannelFlow(String),

    /// Channel ordering is not the one required (or previously negotiated).
    #[error("Invalid channel ordering: expected {expected}, got {got}")]
    InvalidChannelOrdering {
        /// Required ordering
        expected: String,
        /// Supplied ordering
        got: String,
    },

    /// Port is not a valid controller port.
    #[error("Invalid controller port: {0}")]
    InvalidControllerPort(String),

    /// Port is not the host port.
    #[error("Invalid host port: expected {expected}, got {got}")]
    InvalidHostPort {
        /// Host port identifier
        expected: String,
        /// Supplied port identifier
        got: String,
    },

    /// Owner identifier is blank or too long.
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    /// Version string is malformed or carries an unsupported protocol version.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Encoding listed in the metadata is not supported.
    #[error("Unsupported encoding format: {0}")]
    UnsupportedEncoding(String),

    /// Transaction type listed in the metadata is not supported.
    #[error("Unsupported transaction type: {0}")]
    UnsupportedTxType(String),

    /// Interchain account address is blank, too long, or changed.
    #[error("Invalid account address: {0}")]
    InvalidAccountAddress(String),

    /// Connection identifiers do not match the channel's connection.
    #[error("Invalid connection: expected {expected}, got {got}")]
    InvalidConnection {
        /// Identifier observed on the transport
        expected: String,
        /// Identifier carried in the metadata
        got: String,
    },

    /// Connection unknown to the transport.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Channel unknown to the transport.
    #[error("Channel not found: port {port_id}, channel {channel_id}")]
    ChannelNotFound {
        /// Port identifier
        port_id: String,
        /// Channel identifier
        channel_id: String,
    },

    /// Channel is not in a state that allows the operation.
    #[error("Channel closed: port {port_id}, channel {channel_id}")]
    ChannelClosed {
        /// Port identifier
        port_id: String,
        /// Channel identifier
        channel_id: String,
    },

    /// A non-closed active channel is already registered for the key.
    #[error("Active channel already set: channel {channel_id} on port {port_id}")]
    ActiveChannelAlreadySet {
        /// Existing channel identifier
        channel_id: String,
        /// Port identifier
        port_id: String,
    },

    /// No open active channel is registered for the key.
    #[error("Active channel not found: connection {connection_id}, port {port_id}")]
    ActiveChannelNotFound {
        /// Connection identifier
        connection_id: String,
        /// Port identifier
        port_id: String,
    },

    /// No interchain account is registered for the key.
    #[error("Interchain account not found on port {0}")]
    InterchainAccountNotFound(String),

    /// An account already exists at the derived address.
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// Stored address does not belong to an interchain account.
    #[error("Invalid account reopening: {0}")]
    InvalidAccountReopening(String),

    /// Signer or message type not permitted.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Timeout timestamp is not strictly in the future.
    #[error("Invalid timeout timestamp: timeout {timeout} must be after current time {now}")]
    InvalidTimeoutTimestamp {
        /// Requested timeout (ns)
        timeout: u64,
        /// Current block time (ns)
        now: u64,
    },

    /// Packet envelope failed basic validation.
    #[error("Invalid packet data: {0}")]
    InvalidPacketData(String),

    /// Bytes could not be decoded into the expected type.
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// Packet type is not handled.
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    /// No handler is registered for the message type.
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// A sub-operation failed during execution.
    #[error("Message execution failed: {0}")]
    MessageExecution(String),

    /// Request rejected outright.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Proposed channel upgrade is not permitted.
    #[error("Invalid upgrade: {0}")]
    InvalidUpgrade(String),

    /// Capability missing for the given path.
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    /// Capability could not be created or claimed.
    #[error("Capability error: {0}")]
    Capability(String),

    /// Controller submodule is disabled.
    #[error("Controller submodule is disabled")]
    ControllerDisabled,

    /// Host submodule is disabled.
    #[error("Host submodule is disabled")]
    HostDisabled,

    /// Underlying application rejected the callback.
    #[error("Application callback failed: {0}")]
    Application(String),

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store read or write failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Internal bookkeeping is inconsistent. Never retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl IcaError {
    /// Returns true when the error indicates inconsistent internal state.
    ///
    /// Callers must abort the enclosing state transition instead of
    /// recovering from a fatal error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }

    /// Stable numeric code for the error, carried in error acknowledgements.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidChannelFlow(_) => 2,
            Self::InvalidChannelOrdering { .. } => 3,
            Self::InvalidControllerPort(_) => 4,
            Self::InvalidHostPort { .. } => 5,
            Self::InvalidOwner(_) => 6,
            Self::InvalidVersion(_) => 7,
            Self::UnsupportedEncoding(_) => 8,
            Self::UnsupportedTxType(_) => 9,
            Self::InvalidAccountAddress(_) => 10,
            Self::InvalidConnection { .. } => 11,
            Self::ConnectionNotFound(_) => 12,
            Self::ChannelNotFound { .. } => 13,
            Self::ChannelClosed { .. } => 14,
            Self::ActiveChannelAlreadySet { .. } => 15,
            Self::ActiveChannelNotFound { .. } => 16,
            Self::InterchainAccountNotFound(_) => 17,
            Self::AccountAlreadyExists(_) => 18,
            Self::InvalidAccountReopening(_) => 19,
            Self::Unauthorized(_) => 20,
            Self::InvalidTimeoutTimestamp { .. } => 21,
            Self::InvalidPacketData(_) => 22,
            Self::InvalidType(_) => 23,
            Self::UnknownDataType(_) => 24,
            Self::InvalidRoute(_) => 25,
            Self::MessageExecution(_) => 26,
            Self::InvalidRequest(_) => 27,
            Self::InvalidUpgrade(_) => 28,
            Self::CapabilityNotFound(_) => 29,
            Self::Capability(_) => 30,
            Self::ControllerDisabled => 31,
            Self::HostDisabled => 32,
            Self::Application(_) => 33,
            Self::InvalidConfig(_) => 34,
            Self::Store(_) => 35,
            Self::InvariantViolation(_) => 36,
        }
    }
}
