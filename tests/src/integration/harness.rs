//! # Two-Chain Harness
//!
//! Builds a controller chain and a host chain connected by
//! `connection-0` (controller) and `connection-7` (host), and exposes the
//! steps a relayer performs between them.

use qc_15_interchain_accounts::adapters::{
    set_balance, InMemoryAccountKeeper, InMemoryMsgRouter, InMemoryTransport, ManualTimeSource,
    MemoryStore, OpenTryParams,
};
use qc_15_interchain_accounts::domain::{serialize_tx, ChannelId, PortId};
use qc_15_interchain_accounts::{
    Acknowledgement, AnyMsg, ChannelKeeper, ControllerKeeper, ControllerParams, HostKeeper,
    HostParams, IcaControllerMiddleware, IcaError, IcaHostModule, Metadata,
    MsgRegisterInterchainAccount, MsgSendTx, Packet, PacketData, TimeSource,
    CONTROLLER_PORT_PREFIX, CONTROLLER_SUBMODULE, HOST_PORT_ID, HOST_SUBMODULE,
};
use std::sync::Arc;

/// Controller-side connection identifier.
pub const CONTROLLER_CONNECTION: &str = "connection-0";
/// Host-side connection identifier.
pub const HOST_CONNECTION: &str = "connection-7";
/// Relayer address attached to every relayed step.
pub const RELAYER: &str = "relayer";
/// Genesis block time of both chains, in nanoseconds.
pub const GENESIS_NANOS: u64 = 1_700_000_000_000_000_000;
/// Default relative packet timeout: ten minutes.
pub const DEFAULT_TIMEOUT: u64 = 600_000_000_000;

/// Controller chain.
pub struct ControllerChain {
    pub transport: Arc<InMemoryTransport>,
    pub time: Arc<ManualTimeSource>,
    pub keeper: Arc<ControllerKeeper>,
    pub middleware: Arc<IcaControllerMiddleware>,
}

/// Host chain.
pub struct HostChain {
    pub transport: Arc<InMemoryTransport>,
    pub time: Arc<ManualTimeSource>,
    pub store: Arc<MemoryStore>,
    pub accounts: Arc<InMemoryAccountKeeper>,
    pub keeper: Arc<HostKeeper>,
    pub module: Arc<IcaHostModule>,
}

/// Channel pair opened for one owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenAccount {
    pub port_id: PortId,
    pub controller_channel: ChannelId,
    pub host_channel: ChannelId,
    pub address: String,
}

/// Controller and host chains plus relayer steps.
pub struct IcaHarness {
    pub controller: ControllerChain,
    pub host: HostChain,
}

impl IcaHarness {
    /// Harness with default parameters on both chains.
    pub fn new() -> Self {
        Self::with_params(ControllerParams::default(), HostParams::default())
    }

    /// Harness with explicit module parameters.
    pub fn with_params(controller_params: ControllerParams, host_params: HostParams) -> Self {
        Self {
            controller: ControllerChain::new(controller_params),
            host: HostChain::new(host_params),
        }
    }

    /// Controller port of `owner`.
    pub fn port_of(owner: &str) -> PortId {
        format!("{}{}", CONTROLLER_PORT_PREFIX, owner)
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    /// Submit a registration with default metadata.
    pub fn register(&self, owner: &str) -> Result<(PortId, ChannelId), IcaError> {
        self.register_with(MsgRegisterInterchainAccount::new(owner, CONTROLLER_CONNECTION))
    }

    /// Submit an arbitrary registration message.
    pub fn register_with(
        &self,
        msg: MsgRegisterInterchainAccount,
    ) -> Result<(PortId, ChannelId), IcaError> {
        let response = self.controller.keeper.handle_register_interchain_account(&msg)?;
        Ok((response.port_id, response.channel_id))
    }

    /// Relay open-try, open-ack and open-confirm for a channel in INIT on the
    /// controller. Returns the host channel.
    pub fn relay_handshake(&self, port_id: &str, channel_id: &str) -> Result<ChannelId, IcaError> {
        let channel = self
            .controller
            .transport
            .get_channel(port_id, channel_id)
            .ok_or_else(|| IcaError::ChannelNotFound {
                port_id: port_id.to_string(),
                channel_id: channel_id.to_string(),
            })?;

        let host_channel = self.host.transport.chan_open_try(OpenTryParams {
            port_id: HOST_PORT_ID.to_string(),
            connection_id: HOST_CONNECTION.to_string(),
            ordering: channel.ordering,
            counterparty_port_id: port_id.to_string(),
            counterparty_channel_id: channel_id.to_string(),
            counterparty_version: channel.version,
        })?;

        let host_version = self
            .host
            .transport
            .app_version(HOST_PORT_ID, &host_channel)
            .ok_or_else(|| IcaError::ChannelNotFound {
                port_id: HOST_PORT_ID.to_string(),
                channel_id: host_channel.clone(),
            })?;

        self.controller
            .transport
            .chan_open_ack(port_id, channel_id, &host_channel, &host_version)?;
        self.host
            .transport
            .chan_open_confirm(HOST_PORT_ID, &host_channel)?;
        Ok(host_channel)
    }

    /// Register `owner` and complete the handshake.
    pub fn open_account(&self, owner: &str) -> Result<OpenAccount, IcaError> {
        let (port_id, controller_channel) = self.register(owner)?;
        let host_channel = self.relay_handshake(&port_id, &controller_channel)?;
        let address = self
            .controller
            .keeper
            .get_interchain_account_address(owner, CONTROLLER_CONNECTION)?
            .ok_or_else(|| IcaError::InterchainAccountNotFound(port_id.clone()))?;
        Ok(OpenAccount {
            port_id,
            controller_channel,
            host_channel,
            address,
        })
    }

    // =========================================================================
    // PACKETS
    // =========================================================================

    /// Send `msgs` for `owner`, encoded as the active channel negotiated.
    pub fn send_msgs(&self, owner: &str, msgs: &[AnyMsg]) -> Result<Packet, IcaError> {
        let port_id = Self::port_of(owner);
        let channel_id = self
            .controller
            .keeper
            .get_open_active_channel(CONTROLLER_CONNECTION, &port_id)?
            .ok_or_else(|| IcaError::ActiveChannelNotFound {
                connection_id: CONTROLLER_CONNECTION.to_string(),
                port_id: port_id.clone(),
            })?;
        let version = self
            .controller
            .keeper
            .get_app_version(&port_id, &channel_id)
            .unwrap_or_default();
        let encoding = Metadata::decode(&version)?.encoding()?;
        let data = serialize_tx(msgs, encoding)?;
        self.send_packet_data(owner, PacketData::execute_tx(data, ""), DEFAULT_TIMEOUT)
    }

    /// Submit a send message and return the committed packet.
    pub fn send_packet_data(
        &self,
        owner: &str,
        packet_data: PacketData,
        relative_timeout: u64,
    ) -> Result<Packet, IcaError> {
        let msg = MsgSendTx {
            owner: owner.to_string(),
            connection_id: CONTROLLER_CONNECTION.to_string(),
            packet_data,
            relative_timeout,
        };
        let sequence = self.controller.keeper.handle_send_tx(&msg)?.sequence;

        let port_id = Self::port_of(owner);
        let channel_id = self
            .controller
            .keeper
            .get_active_channel_id(CONTROLLER_CONNECTION, &port_id)?
            .unwrap_or_default();
        self.controller
            .transport
            .packet_commitment(&port_id, &channel_id, sequence)
            .ok_or_else(|| IcaError::InvalidRequest(format!("no commitment for {}", sequence)))
    }

    /// Deliver `packet` to the host and its acknowledgement back to the controller.
    pub fn relay_packet(&self, packet: &Packet) -> Result<Acknowledgement, IcaError> {
        let ack = self.host.transport.recv_packet(packet, RELAYER)?;
        self.controller
            .transport
            .acknowledge_packet(packet, &ack.to_bytes()?, RELAYER)?;
        Ok(ack)
    }

    /// Time `packet` out on the controller and close the host end.
    pub fn relay_timeout(&self, packet: &Packet) -> Result<(), IcaError> {
        self.controller
            .transport
            .timeout_packet(packet, self.host.time.now_nanos(), RELAYER)?;
        self.host
            .transport
            .chan_close_confirm(&packet.destination_port, &packet.destination_channel)
    }

    /// Advance both chain clocks.
    pub fn advance_time(&self, nanos: u64) {
        self.controller.time.advance(nanos);
        self.host.time.advance(nanos);
    }

    /// Credit `amount` to `address` on the host.
    pub fn fund(&self, address: &str, amount: u128) -> Result<(), IcaError> {
        set_balance(self.host.store.as_ref(), address, amount)
    }
}

impl Default for IcaHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerChain {
    fn new(params: ControllerParams) -> Self {
        let time = Arc::new(ManualTimeSource::new(GENESIS_NANOS));
        let transport = Arc::new(
            InMemoryTransport::new("controller-1").with_time_source(time.clone()),
        );
        transport.add_connection(CONTROLLER_CONNECTION, "07-tendermint-0", HOST_CONNECTION);

        let keeper = Arc::new(ControllerKeeper::new(
            Arc::new(MemoryStore::new()),
            transport.clone(),
            Arc::new(transport.capability_registry().scope(CONTROLLER_SUBMODULE)),
            time.clone(),
            params,
        ));
        let middleware = Arc::new(IcaControllerMiddleware::new(keeper.clone()));
        transport.bind_route(CONTROLLER_PORT_PREFIX, &middleware);

        Self {
            transport,
            time,
            keeper,
            middleware,
        }
    }
}

impl HostChain {
    fn new(params: HostParams) -> Self {
        let time = Arc::new(ManualTimeSource::new(GENESIS_NANOS));
        let transport =
            Arc::new(InMemoryTransport::new("host-1").with_time_source(time.clone()));
        transport.add_connection(HOST_CONNECTION, "07-tendermint-0", CONTROLLER_CONNECTION);

        let store = Arc::new(MemoryStore::new());
        let accounts = Arc::new(InMemoryAccountKeeper::new());
        let keeper = Arc::new(HostKeeper::new(
            store.clone(),
            transport.clone(),
            Arc::new(transport.capability_registry().scope(HOST_SUBMODULE)),
            accounts.clone(),
            Arc::new(InMemoryMsgRouter::with_bank()),
            params,
            "qc",
        ));
        let module = Arc::new(IcaHostModule::new(keeper.clone()));
        transport.bind_route(HOST_PORT_ID, &module);

        Self {
            transport,
            time,
            store,
            accounts,
            keeper,
            module,
        }
    }
}
