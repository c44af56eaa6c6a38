//! # Host Relay
//!
//! Packet receipt on the host chain: decode the envelope, authenticate every
//! sub-operation against the interchain account and the allow-list, then
//! execute the batch on a cache branch that is written back only if every
//! sub-operation succeeds.

use super::keeper::HostKeeper;
use crate::domain::{
    deserialize_tx, invariant_signers_authorized, AnyMsg, CacheStore, ChannelId, IcaError, Packet,
    PacketData, PacketType, PortId, TxMsgData,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, info};

/// Marks a `(port, channel)` receipt as executing until dropped.
struct ReceiptGuard<'a> {
    executing: &'a Mutex<HashSet<(PortId, ChannelId)>>,
    key: (PortId, ChannelId),
}

impl<'a> ReceiptGuard<'a> {
    fn enter(
        executing: &'a Mutex<HashSet<(PortId, ChannelId)>>,
        port_id: &str,
        channel_id: &str,
    ) -> Result<Self, IcaError> {
        let key = (port_id.to_string(), channel_id.to_string());
        if !executing.lock().insert(key.clone()) {
            return Err(IcaError::InvalidRequest(format!(
                "packet receipt already executing on port {}, channel {}",
                port_id, channel_id
            )));
        }
        Ok(Self { executing, key })
    }
}

impl Drop for ReceiptGuard<'_> {
    fn drop(&mut self) {
        self.executing.lock().remove(&self.key);
    }
}

impl HostKeeper {
    /// Execute a received packet and return the acknowledgement result bytes.
    ///
    /// A sub-operation that re-enters receipt on the same channel is rejected.
    pub fn on_recv_packet(&self, packet: &Packet) -> Result<Vec<u8>, IcaError> {
        let _guard = ReceiptGuard::enter(
            &self.executing,
            &packet.destination_port,
            &packet.destination_channel,
        )?;

        let packet_data = PacketData::from_bytes(&packet.data)?;
        let metadata = self.app_metadata(&packet.destination_port, &packet.destination_channel)?;

        match packet_data.packet_type {
            PacketType::ExecuteTx => {
                let msgs = deserialize_tx(&packet_data.data, metadata.encoding()?)?;
                self.execute_tx(
                    &packet.source_port,
                    &packet.destination_port,
                    &packet.destination_channel,
                    &msgs,
                )
            }
            PacketType::Unspecified => Err(IcaError::UnknownDataType(format!(
                "unknown packet data type: {:?}",
                packet_data.packet_type
            ))),
        }
    }

    /// Authenticate and execute a batch received from `source_port` over
    /// `(dest_port, dest_channel)`.
    pub fn execute_tx(
        &self,
        source_port: &str,
        dest_port: &str,
        dest_channel: &str,
        msgs: &[AnyMsg],
    ) -> Result<Vec<u8>, IcaError> {
        let channel = self.require_channel(dest_port, dest_channel)?;
        let connection_id = channel.connection_id().ok_or_else(|| {
            IcaError::InvalidRequest(format!("channel {} has no connection hops", dest_channel))
        })?;

        self.authenticate_tx(msgs, connection_id, source_port)?;

        let handlers = msgs
            .iter()
            .map(|msg| {
                let handler = self
                    .router
                    .handler(&msg.type_url)
                    .ok_or_else(|| IcaError::InvalidRoute(msg.type_url.clone()))?;
                handler.validate_basic(msg)?;
                Ok(handler)
            })
            .collect::<Result<Vec<_>, IcaError>>()?;

        let cache = CacheStore::new(self.store.as_ref());
        let mut msg_responses = Vec::with_capacity(msgs.len());
        for (msg, handler) in msgs.iter().zip(&handlers) {
            msg_responses.push(handler.execute(&cache, msg)?);
            debug!(type_url = %msg.type_url, "Sub-operation executed");
        }
        cache.write()?;

        info!(
            connection_id,
            source_port,
            messages = msgs.len(),
            "Interchain accounts batch executed"
        );
        TxMsgData { msg_responses }.to_bytes()
    }

    /// Check every sub-operation against the allow-list, the router and the
    /// registered interchain account.
    fn authenticate_tx(&self, msgs: &[AnyMsg], connection_id: &str, port_id: &str) -> Result<(), IcaError> {
        let address = self
            .registry
            .get_interchain_account_address(connection_id, port_id)?
            .ok_or_else(|| {
                IcaError::InterchainAccountNotFound(format!(
                    "failed to retrieve interchain account on port {}",
                    port_id
                ))
            })?;

        let params = self.params();
        for msg in msgs {
            if !params.is_allowed(&msg.type_url) {
                return Err(IcaError::Unauthorized(format!(
                    "message type not allowed: {}",
                    msg.type_url
                )));
            }
            let handler = self
                .router
                .handler(&msg.type_url)
                .ok_or_else(|| IcaError::InvalidRoute(msg.type_url.clone()))?;
            let signers = handler.signers(msg)?;
            invariant_signers_authorized(&msg.type_url, &signers, &address)?;
        }
        Ok(())
    }
}
