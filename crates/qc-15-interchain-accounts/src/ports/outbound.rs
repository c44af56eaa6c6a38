//! # Outbound Ports
//!
//! Collaborators the subsystem depends on: the chain's key-value state, the
//! channel transport, the capability store, the account store, the message
//! router that executes sub-operations, and the block clock.

use crate::domain::{
    AccountRecord, AnyMsg, Capability, ChannelEnd, ChannelId, ConnectionEnd, ConnectionId,
    IcaError, MsgResponse, Order, PortId,
};
use std::sync::Arc;

/// Versioned key-value state of the chain.
///
/// All registry bookkeeping and every sub-operation executed on the host goes
/// through this port, so a [`CacheStore`](crate::domain::CacheStore) wrapped
/// around it isolates a whole batch.
pub trait KvStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IcaError>;

    /// Write a value.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), IcaError>;

    /// Remove a value.
    fn delete(&self, key: &[u8]) -> Result<(), IcaError>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, IcaError>;

    /// Whether a key is present.
    fn has(&self, key: &[u8]) -> Result<bool, IcaError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Request to open a new channel end on the local chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOpenInitRequest {
    /// Local port.
    pub port_id: PortId,
    /// Connection the channel runs over.
    pub connection_hops: Vec<ConnectionId>,
    /// Port on the counterparty chain.
    pub counterparty_port_id: PortId,
    /// Requested ordering.
    pub ordering: Order,
    /// Proposed application version. Blank lets the application choose.
    pub version: String,
}

/// Channel and connection transport.
///
/// Opening a channel routes the open-init callback to the module bound to the
/// port before the channel end is written.
pub trait ChannelKeeper: Send + Sync {
    /// Look up a channel end.
    fn get_channel(&self, port_id: &str, channel_id: &str) -> Option<ChannelEnd>;

    /// Look up a connection end.
    fn get_connection(&self, connection_id: &str) -> Result<ConnectionEnd, IcaError>;

    /// Bind a port, returning its capability.
    fn bind_port(&self, port_id: &str) -> Result<Capability, IcaError>;

    /// Run open-init for a new channel and return its identifier.
    fn chan_open_init(&self, request: ChannelOpenInitRequest) -> Result<ChannelId, IcaError>;

    /// Commit an outgoing packet, returning its sequence number.
    fn send_packet(
        &self,
        capability: &Capability,
        source_port: &str,
        source_channel: &str,
        timeout_timestamp: u64,
        data: Vec<u8>,
    ) -> Result<u64, IcaError>;
}

/// Object-capability store scoped to one module.
pub trait CapabilityKeeper: Send + Sync {
    /// Mint a capability owned by this module under `name`.
    fn new_capability(&self, name: &str) -> Result<Capability, IcaError>;

    /// Take co-ownership of a capability minted elsewhere.
    fn claim_capability(&self, capability: &Capability, name: &str) -> Result<(), IcaError>;

    /// Capability this module owns under `name`.
    fn get_capability(&self, name: &str) -> Option<Capability>;

    /// Whether `capability` is the one this module owns under `name`.
    fn authenticate_capability(&self, capability: &Capability, name: &str) -> bool;
}

/// Account store of the host chain.
pub trait AccountKeeper: Send + Sync {
    /// Look up an account.
    fn get_account(&self, address: &str) -> Option<AccountRecord>;

    /// Create or replace an account.
    fn set_account(&self, account: AccountRecord) -> Result<(), IcaError>;
}

/// Handler for one sub-operation type.
pub trait MsgHandler: Send + Sync {
    /// Addresses that must authorize the message.
    fn signers(&self, msg: &AnyMsg) -> Result<Vec<String>, IcaError>;

    /// Stateless validation.
    fn validate_basic(&self, msg: &AnyMsg) -> Result<(), IcaError>;

    /// Apply the message to `store`.
    fn execute(&self, store: &dyn KvStore, msg: &AnyMsg) -> Result<MsgResponse, IcaError>;
}

/// Routes sub-operations to their handlers by type URL.
pub trait MessageRouter: Send + Sync {
    /// Handler for `type_url`, if any.
    fn handler(&self, type_url: &str) -> Option<Arc<dyn MsgHandler>>;
}

/// Source of the current block time.
pub trait TimeSource: Send + Sync {
    /// Current block time in nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> u64;
}
