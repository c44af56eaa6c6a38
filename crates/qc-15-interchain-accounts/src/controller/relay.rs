//! # Controller Relay
//!
//! Packet send path and the acknowledgement/timeout reconciler.
//!
//! Channels are ordered, so the transport closes a channel whose packet times
//! out. The registry keeps pointing at the closed channel and a later
//! open-init re-opens it.

use super::keeper::ControllerKeeper;
use crate::domain::{Acknowledgement, IcaError, Packet, PacketData};
use tracing::{debug, info, warn};

impl ControllerKeeper {
    /// Send `packet_data` over the open active channel of `(connection_id, port_id)`.
    ///
    /// `timeout_timestamp` is absolute block time in nanoseconds and must lie
    /// in the future. Returns the packet sequence.
    pub fn send_tx(
        &self,
        connection_id: &str,
        port_id: &str,
        packet_data: &PacketData,
        timeout_timestamp: u64,
    ) -> Result<u64, IcaError> {
        let channel_id = self
            .registry
            .get_open_active_channel(connection_id, port_id)?
            .ok_or_else(|| IcaError::ActiveChannelNotFound {
                connection_id: connection_id.to_string(),
                port_id: port_id.to_string(),
            })?;

        let capability = self.authenticate_channel(port_id, &channel_id)?;

        let now = self.time.now_nanos();
        if now >= timeout_timestamp {
            return Err(IcaError::InvalidTimeoutTimestamp {
                timeout: timeout_timestamp,
                now,
            });
        }

        packet_data.validate_basic()?;
        let data = packet_data.to_bytes()?;

        let sequence =
            self.channels
                .send_packet(&capability, port_id, &channel_id, timeout_timestamp, data)?;

        info!(
            port_id,
            channel_id = %channel_id,
            connection_id,
            sequence,
            "Interchain accounts packet sent"
        );
        Ok(sequence)
    }

    /// Record the outcome of a delivered packet.
    pub fn on_acknowledgement_packet(&self, packet: &Packet, acknowledgement: &[u8]) -> Result<(), IcaError> {
        match Acknowledgement::from_bytes(acknowledgement)? {
            Acknowledgement::Result(_) => debug!(
                port_id = %packet.source_port,
                channel_id = %packet.source_channel,
                sequence = packet.sequence,
                "Interchain accounts packet executed"
            ),
            Acknowledgement::Error(error) => warn!(
                port_id = %packet.source_port,
                channel_id = %packet.source_channel,
                sequence = packet.sequence,
                %error,
                "Interchain accounts packet failed on host"
            ),
        }
        Ok(())
    }

    /// Record a packet timeout. The transport closes the ordered channel.
    pub fn on_timeout_packet(&self, packet: &Packet) -> Result<(), IcaError> {
        warn!(
            port_id = %packet.source_port,
            channel_id = %packet.source_channel,
            sequence = packet.sequence,
            "Interchain accounts packet timed out"
        );
        Ok(())
    }
}
