//! # Host Module
//!
//! Channel callbacks of the host chain. The host never initiates a handshake
//! or an upgrade, never sends packets, and turns every receipt into an
//! acknowledgement.

use super::keeper::HostKeeper;
use crate::domain::{Acknowledgement, ConnectionId, IcaError, Order, Packet};
use crate::ports::{ChannelOpenRequest, ChannelUpgradeRequest, IbcModule, UpgradableModule};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Host-side channel module.
pub struct IcaHostModule {
    keeper: Arc<HostKeeper>,
}

impl IcaHostModule {
    /// Module over `keeper`.
    pub fn new(keeper: Arc<HostKeeper>) -> Self {
        Self { keeper }
    }

    /// Underlying keeper.
    pub fn keeper(&self) -> &Arc<HostKeeper> {
        &self.keeper
    }
}

fn initiated_by_controller() -> IcaError {
    IcaError::InvalidChannelFlow(
        "channel handshake must be initiated by controller chain".to_string(),
    )
}

impl IbcModule for IcaHostModule {
    fn on_chan_open_init(&self, _request: &ChannelOpenRequest) -> Result<String, IcaError> {
        Err(initiated_by_controller())
    }

    fn on_chan_open_try(&self, request: &ChannelOpenRequest) -> Result<String, IcaError> {
        self.keeper.ensure_enabled()?;
        self.keeper.on_chan_open_try(request)
    }

    fn on_chan_open_ack(
        &self,
        _port_id: &str,
        _channel_id: &str,
        _counterparty_channel_id: &str,
        _counterparty_version: &str,
    ) -> Result<(), IcaError> {
        Err(initiated_by_controller())
    }

    fn on_chan_open_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        self.keeper.ensure_enabled()?;
        self.keeper.on_chan_open_confirm(port_id, channel_id)
    }

    fn on_chan_close_init(&self, _port_id: &str, _channel_id: &str) -> Result<(), IcaError> {
        Err(IcaError::InvalidRequest("user cannot close channel".to_string()))
    }

    fn on_chan_close_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        self.keeper.on_chan_close_confirm(port_id, channel_id)
    }

    fn on_recv_packet(&self, packet: &Packet, _relayer: &str) -> Acknowledgement {
        if !self.keeper.is_enabled() {
            warn!(
                port_id = %packet.destination_port,
                channel_id = %packet.destination_channel,
                sequence = packet.sequence,
                "Packet received while host is disabled"
            );
            return Acknowledgement::error(&IcaError::HostDisabled);
        }

        match self.keeper.on_recv_packet(packet) {
            Ok(result) => {
                info!(
                    port_id = %packet.destination_port,
                    channel_id = %packet.destination_channel,
                    sequence = packet.sequence,
                    "Packet executed"
                );
                Acknowledgement::success(result)
            }
            Err(e) if e.is_fatal() => {
                error!(
                    port_id = %packet.destination_port,
                    channel_id = %packet.destination_channel,
                    sequence = packet.sequence,
                    error = %e,
                    "Packet execution hit inconsistent state"
                );
                Acknowledgement::error(&e)
            }
            Err(e) => {
                warn!(
                    port_id = %packet.destination_port,
                    channel_id = %packet.destination_channel,
                    sequence = packet.sequence,
                    error = %e,
                    "Packet execution failed"
                );
                Acknowledgement::error(&e)
            }
        }
    }

    fn on_acknowledgement_packet(
        &self,
        _packet: &Packet,
        _acknowledgement: &[u8],
        _relayer: &str,
    ) -> Result<(), IcaError> {
        Err(IcaError::InvalidChannelFlow(
            "cannot receive acknowledgement on a host channel end".to_string(),
        ))
    }

    fn on_timeout_packet(&self, _packet: &Packet, _relayer: &str) -> Result<(), IcaError> {
        Err(IcaError::InvalidChannelFlow(
            "cannot cause a packet timeout on a host channel end".to_string(),
        ))
    }

    fn get_app_version(&self, port_id: &str, channel_id: &str) -> Option<String> {
        self.keeper.get_app_version(port_id, channel_id)
    }

    fn as_upgradable(&self) -> Option<&dyn UpgradableModule> {
        Some(self)
    }
}

impl UpgradableModule for IcaHostModule {
    fn on_chan_upgrade_init(&self, _request: &ChannelUpgradeRequest) -> Result<String, IcaError> {
        Err(IcaError::InvalidChannelFlow(
            "channel upgrade handshake must be initiated by controller chain".to_string(),
        ))
    }

    fn on_chan_upgrade_try(&self, request: &ChannelUpgradeRequest) -> Result<String, IcaError> {
        self.keeper.ensure_enabled()?;
        self.keeper.on_chan_upgrade_try(request)
    }

    fn on_chan_upgrade_ack(
        &self,
        _port_id: &str,
        _channel_id: &str,
        _counterparty_version: &str,
    ) -> Result<(), IcaError> {
        Err(IcaError::InvalidChannelFlow(
            "channel upgrade handshake must be initiated by controller chain".to_string(),
        ))
    }

    fn on_chan_upgrade_open(
        &self,
        port_id: &str,
        channel_id: &str,
        _proposed_order: Order,
        _proposed_connection_hops: &[ConnectionId],
        _proposed_version: &str,
    ) {
        debug!(port_id, channel_id, "Host upgrade open");
    }
}
