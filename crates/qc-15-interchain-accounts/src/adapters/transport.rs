//! In-memory channel transport.
//!
//! Simulates the generic channel layer of one chain: connections, channel
//! ends, packet commitments, acknowledgements and port routing. Handshake and
//! packet steps that a relayer would trigger are exposed as inherent methods
//! so tests can drive two chains against each other. Proofs are not verified.
//!
//! Modules are bound to port prefixes and held weakly, so a module that owns
//! a keeper that owns this transport does not form a reference cycle.

use super::capability::{CapabilityRegistry, ScopedCapabilityKeeper};
use super::time::SystemTimeSource;
use crate::domain::{
    channel_capability_path, port_path, Acknowledgement, Capability, ChannelEnd, ChannelId,
    ChannelState, ConnectionEnd, ConnectionId, Counterparty, IcaError, Order, Packet, PortId,
};
use crate::ports::{
    CapabilityKeeper, ChannelKeeper, ChannelOpenInitRequest, ChannelOpenRequest, IbcModule,
    TimeSource,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Module name owning transport-minted capabilities.
pub const TRANSPORT_MODULE: &str = "ibc";

type ChannelKey = (PortId, ChannelId);
type PacketKey = (PortId, ChannelId, u64);

/// Parameters of an open-try step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenTryParams {
    /// Local port.
    pub port_id: PortId,
    /// Local connection.
    pub connection_id: ConnectionId,
    /// Ordering proposed by the counterparty.
    pub ordering: Order,
    /// Counterparty port.
    pub counterparty_port_id: PortId,
    /// Counterparty channel.
    pub counterparty_channel_id: ChannelId,
    /// Version written on the counterparty channel end.
    pub counterparty_version: String,
}

/// Channel transport of one simulated chain.
pub struct InMemoryTransport {
    chain_id: String,
    connections: RwLock<HashMap<ConnectionId, ConnectionEnd>>,
    channels: RwLock<HashMap<ChannelKey, ChannelEnd>>,
    next_channel: Mutex<u64>,
    next_sequence_send: RwLock<HashMap<ChannelKey, u64>>,
    next_sequence_recv: RwLock<HashMap<ChannelKey, u64>>,
    commitments: RwLock<HashMap<PacketKey, Packet>>,
    acknowledgements: RwLock<HashMap<PacketKey, Vec<u8>>>,
    capability_registry: Arc<CapabilityRegistry>,
    capabilities: ScopedCapabilityKeeper,
    routes: RwLock<Vec<(String, Weak<dyn IbcModule>)>>,
    time: Arc<dyn TimeSource>,
}

impl InMemoryTransport {
    /// Create a transport for `chain_id` using wall-clock time.
    pub fn new(chain_id: impl Into<String>) -> Self {
        let capability_registry = CapabilityRegistry::new();
        let capabilities = capability_registry.scope(TRANSPORT_MODULE);
        Self {
            chain_id: chain_id.into(),
            connections: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            next_channel: Mutex::new(0),
            next_sequence_send: RwLock::new(HashMap::new()),
            next_sequence_recv: RwLock::new(HashMap::new()),
            commitments: RwLock::new(HashMap::new()),
            acknowledgements: RwLock::new(HashMap::new()),
            capability_registry,
            capabilities,
            routes: RwLock::new(Vec::new()),
            time: Arc::new(SystemTimeSource),
        }
    }

    /// Use `time` as the chain's block clock.
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Chain identifier.
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Capability registry shared with the modules of this chain.
    pub fn capability_registry(&self) -> Arc<CapabilityRegistry> {
        Arc::clone(&self.capability_registry)
    }

    // =========================================================================
    // SETUP
    // =========================================================================

    /// Register an established connection.
    pub fn add_connection(
        &self,
        connection_id: impl Into<String>,
        client_id: impl Into<String>,
        counterparty_connection_id: impl Into<String>,
    ) {
        self.connections.write().insert(
            connection_id.into(),
            ConnectionEnd {
                client_id: client_id.into(),
                counterparty_connection_id: counterparty_connection_id.into(),
            },
        );
    }

    /// Route callbacks for ports starting with `port_prefix` to `module`.
    /// The longest matching prefix wins.
    pub fn bind_route<M: IbcModule + 'static>(&self, port_prefix: impl Into<String>, module: &Arc<M>) {
        let weak: Weak<M> = Arc::downgrade(module);
        let weak: Weak<dyn IbcModule> = weak;
        self.routes.write().push((port_prefix.into(), weak));
    }

    /// Write a channel end directly.
    pub fn insert_channel(&self, port_id: &str, channel_id: &str, channel: ChannelEnd) {
        self.channels
            .write()
            .insert((port_id.to_string(), channel_id.to_string()), channel);
    }

    /// Force a channel into `state`.
    pub fn set_channel_state(
        &self,
        port_id: &str,
        channel_id: &str,
        state: ChannelState,
    ) -> Result<(), IcaError> {
        self.update_channel(port_id, channel_id, |channel| channel.state = state)
    }

    /// Overwrite the version of a channel end.
    pub fn set_channel_version(
        &self,
        port_id: &str,
        channel_id: &str,
        version: &str,
    ) -> Result<(), IcaError> {
        self.update_channel(port_id, channel_id, |channel| {
            channel.version = version.to_string()
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Version negotiated on a channel end.
    pub fn app_version(&self, port_id: &str, channel_id: &str) -> Option<String> {
        self.get_channel(port_id, channel_id).map(|c| c.version)
    }

    /// Next send sequence of a channel.
    pub fn next_sequence_send(&self, port_id: &str, channel_id: &str) -> Option<u64> {
        self.next_sequence_send
            .read()
            .get(&(port_id.to_string(), channel_id.to_string()))
            .copied()
    }

    /// Committed outgoing packet.
    pub fn packet_commitment(&self, port_id: &str, channel_id: &str, sequence: u64) -> Option<Packet> {
        self.commitments
            .read()
            .get(&(port_id.to_string(), channel_id.to_string(), sequence))
            .cloned()
    }

    /// Acknowledgement written for a received packet.
    pub fn acknowledgement(&self, port_id: &str, channel_id: &str, sequence: u64) -> Option<Vec<u8>> {
        self.acknowledgements
            .read()
            .get(&(port_id.to_string(), channel_id.to_string(), sequence))
            .cloned()
    }

    // =========================================================================
    // HANDSHAKE STEPS
    // =========================================================================

    /// Open-try on this chain in response to an open-init on the counterparty.
    pub fn chan_open_try(&self, params: OpenTryParams) -> Result<ChannelId, IcaError> {
        self.get_connection(&params.connection_id)?;
        let module = self.module_for(&params.port_id)?;

        let channel_id = self.peek_channel_id();
        let path = channel_capability_path(&params.port_id, &channel_id);
        let capability = self.capabilities.new_capability(&path)?;

        let request = ChannelOpenRequest {
            order: params.ordering,
            connection_hops: vec![params.connection_id.clone()],
            port_id: params.port_id.clone(),
            channel_id: channel_id.clone(),
            channel_capability: capability,
            counterparty: Counterparty::new(
                params.counterparty_port_id.clone(),
                Some(params.counterparty_channel_id.clone()),
            ),
            version: params.counterparty_version.clone(),
        };

        let version = match module.on_chan_open_try(&request) {
            Ok(version) => version,
            Err(e) => {
                self.capabilities.release_capability(&path);
                return Err(e);
            }
        };

        self.write_new_channel(
            &params.port_id,
            &channel_id,
            ChannelEnd {
                state: ChannelState::TryOpen,
                ordering: params.ordering,
                counterparty: request.counterparty,
                connection_hops: request.connection_hops,
                version,
            },
        );
        info!(
            chain_id = %self.chain_id,
            port_id = %params.port_id,
            channel_id = %channel_id,
            "Channel open-try"
        );
        Ok(channel_id)
    }

    /// Open-ack on the initiating chain.
    pub fn chan_open_ack(
        &self,
        port_id: &str,
        channel_id: &str,
        counterparty_channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), IcaError> {
        self.require_state(port_id, channel_id, ChannelState::Init)?;
        self.module_for(port_id)?.on_chan_open_ack(
            port_id,
            channel_id,
            counterparty_channel_id,
            counterparty_version,
        )?;

        self.update_channel(port_id, channel_id, |channel| {
            channel.state = ChannelState::Open;
            channel.version = counterparty_version.to_string();
            channel.counterparty.channel_id = Some(counterparty_channel_id.to_string());
        })?;
        info!(chain_id = %self.chain_id, port_id, channel_id, "Channel open-ack");
        Ok(())
    }

    /// Open-confirm on the counterparty chain.
    pub fn chan_open_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        self.require_state(port_id, channel_id, ChannelState::TryOpen)?;
        self.module_for(port_id)?
            .on_chan_open_confirm(port_id, channel_id)?;

        self.set_channel_state(port_id, channel_id, ChannelState::Open)?;
        info!(chain_id = %self.chain_id, port_id, channel_id, "Channel open-confirm");
        Ok(())
    }

    /// User-initiated close.
    pub fn chan_close_init(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        let channel = self.require_channel(port_id, channel_id)?;
        if channel.is_closed() {
            return Err(IcaError::ChannelClosed {
                port_id: port_id.to_string(),
                channel_id: channel_id.to_string(),
            });
        }
        self.module_for(port_id)?
            .on_chan_close_init(port_id, channel_id)?;
        self.set_channel_state(port_id, channel_id, ChannelState::Closed)
    }

    /// Close in response to the counterparty closing.
    pub fn chan_close_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        self.require_channel(port_id, channel_id)?;
        self.module_for(port_id)?
            .on_chan_close_confirm(port_id, channel_id)?;
        self.set_channel_state(port_id, channel_id, ChannelState::Closed)?;
        info!(chain_id = %self.chain_id, port_id, channel_id, "Channel close-confirm");
        Ok(())
    }

    // =========================================================================
    // PACKET STEPS
    // =========================================================================

    /// Deliver a packet sent by the counterparty.
    pub fn recv_packet(&self, packet: &Packet, relayer: &str) -> Result<Acknowledgement, IcaError> {
        let channel = self.require_channel(&packet.destination_port, &packet.destination_channel)?;
        if channel.state != ChannelState::Open {
            return Err(IcaError::ChannelClosed {
                port_id: packet.destination_port.clone(),
                channel_id: packet.destination_channel.clone(),
            });
        }
        if channel.counterparty.port_id != packet.source_port
            || channel.counterparty.channel_id.as_deref() != Some(packet.source_channel.as_str())
        {
            return Err(IcaError::InvalidRequest(
                "packet source does not match channel counterparty".to_string(),
            ));
        }

        let now = self.time.now_nanos();
        if packet.timeout_timestamp != 0 && now >= packet.timeout_timestamp {
            return Err(IcaError::InvalidTimeoutTimestamp {
                timeout: packet.timeout_timestamp,
                now,
            });
        }

        let key = (
            packet.destination_port.clone(),
            packet.destination_channel.clone(),
        );
        let ack_key = (key.0.clone(), key.1.clone(), packet.sequence);
        match channel.ordering {
            Order::Ordered => {
                let mut next_recv = self.next_sequence_recv.write();
                let expected = next_recv.get(&key).copied().unwrap_or(1);
                if packet.sequence != expected {
                    return Err(IcaError::InvalidRequest(format!(
                        "packet sequence {} != next receive sequence {}",
                        packet.sequence, expected
                    )));
                }
                next_recv.insert(key, expected + 1);
            }
            Order::Unordered => {
                if self.acknowledgements.read().contains_key(&ack_key) {
                    return Err(IcaError::InvalidRequest(format!(
                        "packet {} already received",
                        packet.sequence
                    )));
                }
            }
        }

        let ack = self
            .module_for(&packet.destination_port)?
            .on_recv_packet(packet, relayer);
        self.acknowledgements.write().insert(ack_key, ack.to_bytes()?);

        debug!(
            chain_id = %self.chain_id,
            port_id = %packet.destination_port,
            channel_id = %packet.destination_channel,
            sequence = packet.sequence,
            success = ack.is_success(),
            "Packet received"
        );
        Ok(ack)
    }

    /// Deliver the counterparty's acknowledgement of a packet sent from here.
    pub fn acknowledge_packet(
        &self,
        packet: &Packet,
        acknowledgement: &[u8],
        relayer: &str,
    ) -> Result<(), IcaError> {
        self.require_commitment(packet)?;
        self.module_for(&packet.source_port)?
            .on_acknowledgement_packet(packet, acknowledgement, relayer)?;
        self.remove_commitment(packet);
        Ok(())
    }

    /// Time out a packet sent from here. `counterparty_now` is the
    /// counterparty chain's block time the relayer proves.
    ///
    /// Timing out a packet on an ordered channel closes the channel.
    pub fn timeout_packet(
        &self,
        packet: &Packet,
        counterparty_now: u64,
        relayer: &str,
    ) -> Result<(), IcaError> {
        self.require_commitment(packet)?;
        if counterparty_now < packet.timeout_timestamp {
            return Err(IcaError::InvalidRequest(format!(
                "packet timeout {} has not passed counterparty time {}",
                packet.timeout_timestamp, counterparty_now
            )));
        }

        self.module_for(&packet.source_port)?
            .on_timeout_packet(packet, relayer)?;
        self.remove_commitment(packet);

        let channel = self.require_channel(&packet.source_port, &packet.source_channel)?;
        if channel.ordering == Order::Ordered {
            self.set_channel_state(&packet.source_port, &packet.source_channel, ChannelState::Closed)?;
        }
        info!(
            chain_id = %self.chain_id,
            port_id = %packet.source_port,
            channel_id = %packet.source_channel,
            sequence = packet.sequence,
            "Packet timed out"
        );
        Ok(())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn module_for(&self, port_id: &str) -> Result<Arc<dyn IbcModule>, IcaError> {
        self.routes
            .read()
            .iter()
            .filter(|(prefix, _)| port_id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .and_then(|(_, module)| module.upgrade())
            .ok_or_else(|| IcaError::InvalidRoute(format!("no module bound to port {}", port_id)))
    }

    fn peek_channel_id(&self) -> ChannelId {
        format!("channel-{}", *self.next_channel.lock())
    }

    fn write_new_channel(&self, port_id: &str, channel_id: &str, channel: ChannelEnd) {
        *self.next_channel.lock() += 1;
        let key = (port_id.to_string(), channel_id.to_string());
        self.next_sequence_send.write().insert(key.clone(), 1);
        self.next_sequence_recv.write().insert(key.clone(), 1);
        self.channels.write().insert(key, channel);
    }

    fn require_channel(&self, port_id: &str, channel_id: &str) -> Result<ChannelEnd, IcaError> {
        self.get_channel(port_id, channel_id)
            .ok_or_else(|| IcaError::ChannelNotFound {
                port_id: port_id.to_string(),
                channel_id: channel_id.to_string(),
            })
    }

    fn require_state(
        &self,
        port_id: &str,
        channel_id: &str,
        state: ChannelState,
    ) -> Result<ChannelEnd, IcaError> {
        let channel = self.require_channel(port_id, channel_id)?;
        if channel.state != state {
            return Err(IcaError::InvalidRequest(format!(
                "channel {} on port {} is {}, expected {}",
                channel_id, port_id, channel.state, state
            )));
        }
        Ok(channel)
    }

    fn update_channel(
        &self,
        port_id: &str,
        channel_id: &str,
        apply: impl FnOnce(&mut ChannelEnd),
    ) -> Result<(), IcaError> {
        let mut channels = self.channels.write();
        let channel = channels
            .get_mut(&(port_id.to_string(), channel_id.to_string()))
            .ok_or_else(|| IcaError::ChannelNotFound {
                port_id: port_id.to_string(),
                channel_id: channel_id.to_string(),
            })?;
        apply(channel);
        Ok(())
    }

    fn require_commitment(&self, packet: &Packet) -> Result<(), IcaError> {
        match self.packet_commitment(&packet.source_port, &packet.source_channel, packet.sequence) {
            Some(committed) if committed == *packet => Ok(()),
            Some(_) => Err(IcaError::InvalidRequest(format!(
                "packet {} does not match commitment",
                packet.sequence
            ))),
            None => Err(IcaError::InvalidRequest(format!(
                "no commitment for packet {}",
                packet.sequence
            ))),
        }
    }

    fn remove_commitment(&self, packet: &Packet) {
        self.commitments.write().remove(&(
            packet.source_port.clone(),
            packet.source_channel.clone(),
            packet.sequence,
        ));
    }
}

impl ChannelKeeper for InMemoryTransport {
    fn get_channel(&self, port_id: &str, channel_id: &str) -> Option<ChannelEnd> {
        self.channels
            .read()
            .get(&(port_id.to_string(), channel_id.to_string()))
            .cloned()
    }

    fn get_connection(&self, connection_id: &str) -> Result<ConnectionEnd, IcaError> {
        self.connections
            .read()
            .get(connection_id)
            .cloned()
            .ok_or_else(|| IcaError::ConnectionNotFound(connection_id.to_string()))
    }

    fn bind_port(&self, port_id: &str) -> Result<Capability, IcaError> {
        let capability = self.capabilities.new_capability(&port_path(port_id))?;
        debug!(chain_id = %self.chain_id, port_id, "Port bound");
        Ok(capability)
    }

    fn chan_open_init(&self, request: ChannelOpenInitRequest) -> Result<ChannelId, IcaError> {
        let connection_id = match request.connection_hops.as_slice() {
            [single] => single.clone(),
            hops => {
                return Err(IcaError::InvalidRequest(format!(
                    "expected exactly one connection hop, got {}",
                    hops.len()
                )))
            }
        };
        self.get_connection(&connection_id)?;
        if self
            .capabilities
            .get_capability(&port_path(&request.port_id))
            .is_none()
        {
            return Err(IcaError::CapabilityNotFound(port_path(&request.port_id)));
        }
        let module = self.module_for(&request.port_id)?;

        let channel_id = self.peek_channel_id();
        let path = channel_capability_path(&request.port_id, &channel_id);
        let capability = self.capabilities.new_capability(&path)?;

        let open = ChannelOpenRequest {
            order: request.ordering,
            connection_hops: request.connection_hops,
            port_id: request.port_id,
            channel_id: channel_id.clone(),
            channel_capability: capability,
            counterparty: Counterparty::new(request.counterparty_port_id, None),
            version: request.version,
        };

        let version = match module.on_chan_open_init(&open) {
            Ok(version) => version,
            Err(e) => {
                self.capabilities.release_capability(&path);
                return Err(e);
            }
        };

        self.write_new_channel(
            &open.port_id,
            &channel_id,
            ChannelEnd {
                state: ChannelState::Init,
                ordering: open.order,
                counterparty: open.counterparty,
                connection_hops: open.connection_hops,
                version,
            },
        );
        info!(
            chain_id = %self.chain_id,
            port_id = %open.port_id,
            channel_id = %channel_id,
            "Channel open-init"
        );
        Ok(channel_id)
    }

    fn send_packet(
        &self,
        capability: &Capability,
        source_port: &str,
        source_channel: &str,
        timeout_timestamp: u64,
        data: Vec<u8>,
    ) -> Result<u64, IcaError> {
        let path = channel_capability_path(source_port, source_channel);
        if !self.capabilities.authenticate_capability(capability, &path) {
            return Err(IcaError::Capability(format!(
                "caller does not own capability for {}",
                path
            )));
        }

        let channel = self.require_channel(source_port, source_channel)?;
        if channel.state != ChannelState::Open {
            return Err(IcaError::ChannelClosed {
                port_id: source_port.to_string(),
                channel_id: source_channel.to_string(),
            });
        }
        if timeout_timestamp == 0 {
            return Err(IcaError::InvalidTimeoutTimestamp {
                timeout: 0,
                now: self.time.now_nanos(),
            });
        }
        let destination_channel = channel.counterparty.channel_id.clone().ok_or_else(|| {
            IcaError::InvalidRequest("counterparty channel is not known".to_string())
        })?;

        let key = (source_port.to_string(), source_channel.to_string());
        let sequence = {
            let mut next_send = self.next_sequence_send.write();
            let sequence = next_send.get(&key).copied().unwrap_or(1);
            next_send.insert(key.clone(), sequence + 1);
            sequence
        };

        let packet = Packet {
            sequence,
            source_port: key.0.clone(),
            source_channel: key.1.clone(),
            destination_port: channel.counterparty.port_id.clone(),
            destination_channel,
            data,
            timeout_timestamp,
        };
        self.commitments
            .write()
            .insert((key.0, key.1, sequence), packet);

        debug!(
            chain_id = %self.chain_id,
            port_id = source_port,
            channel_id = source_channel,
            sequence,
            "Packet committed"
        );
        Ok(sequence)
    }
}
