//! # Inbound Ports
//!
//! Callback contract the channel transport drives. Both the controller
//! middleware and the host module implement it.

use crate::domain::{
    Acknowledgement, Capability, ChannelId, ConnectionId, Counterparty, IcaError, Order, Packet,
    PortId,
};

/// Parameters of an open-init or open-try callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOpenRequest {
    /// Requested ordering.
    pub order: Order,
    /// Connection the channel runs over.
    pub connection_hops: Vec<ConnectionId>,
    /// Local port.
    pub port_id: PortId,
    /// Local channel.
    pub channel_id: ChannelId,
    /// Channel capability minted by the transport.
    pub channel_capability: Capability,
    /// Counterparty end.
    pub counterparty: Counterparty,
    /// Proposed version on open-init, counterparty version on open-try.
    pub version: String,
}

/// Parameters of an upgrade-init or upgrade-try callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelUpgradeRequest {
    /// Local port.
    pub port_id: PortId,
    /// Local channel.
    pub channel_id: ChannelId,
    /// Proposed ordering.
    pub proposed_order: Order,
    /// Proposed connection hops.
    pub proposed_connection_hops: Vec<ConnectionId>,
    /// Proposed version on upgrade-init, counterparty version on upgrade-try.
    pub version: String,
}

/// Channel application callbacks.
pub trait IbcModule: Send + Sync {
    /// Open-init: returns the version to write on the channel end.
    fn on_chan_open_init(&self, request: &ChannelOpenRequest) -> Result<String, IcaError>;

    /// Open-try: returns the version to write on the channel end.
    fn on_chan_open_try(&self, request: &ChannelOpenRequest) -> Result<String, IcaError>;

    /// Open-ack on the initiating chain.
    fn on_chan_open_ack(
        &self,
        port_id: &str,
        channel_id: &str,
        counterparty_channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), IcaError>;

    /// Open-confirm on the counterparty chain.
    fn on_chan_open_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError>;

    /// User-initiated close.
    fn on_chan_close_init(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError>;

    /// Counterparty-initiated close.
    fn on_chan_close_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError>;

    /// Packet receipt. Failures are reported in the acknowledgement.
    fn on_recv_packet(&self, packet: &Packet, relayer: &str) -> Acknowledgement;

    /// Acknowledgement of a previously sent packet.
    fn on_acknowledgement_packet(
        &self,
        packet: &Packet,
        acknowledgement: &[u8],
        relayer: &str,
    ) -> Result<(), IcaError>;

    /// Timeout of a previously sent packet.
    fn on_timeout_packet(&self, packet: &Packet, relayer: &str) -> Result<(), IcaError>;

    /// Version negotiated on a channel, if the module tracks one.
    fn get_app_version(&self, _port_id: &str, _channel_id: &str) -> Option<String> {
        None
    }

    /// Upgrade callbacks, if the module supports channel upgrades.
    fn as_upgradable(&self) -> Option<&dyn UpgradableModule> {
        None
    }
}

/// Channel upgrade callbacks.
pub trait UpgradableModule: Send + Sync {
    /// Upgrade-init: returns the version to propose.
    fn on_chan_upgrade_init(&self, request: &ChannelUpgradeRequest) -> Result<String, IcaError>;

    /// Upgrade-try: returns the version to propose.
    fn on_chan_upgrade_try(&self, request: &ChannelUpgradeRequest) -> Result<String, IcaError>;

    /// Upgrade-ack on the initiating chain.
    fn on_chan_upgrade_ack(
        &self,
        port_id: &str,
        channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), IcaError>;

    /// Upgrade completed.
    fn on_chan_upgrade_open(
        &self,
        port_id: &str,
        channel_id: &str,
        proposed_order: Order,
        proposed_connection_hops: &[ConnectionId],
        proposed_version: &str,
    );
}
