//! # Controller Middleware
//!
//! Channel callbacks of the controller chain. The middleware optionally wraps
//! an underlying application that registered accounts through it. Callbacks
//! are forwarded to that application only for `(port, connection)` pairs
//! registered with the middleware flag set, and only after the controller
//! accepted them. The application cannot change the negotiated version.

use super::keeper::ControllerKeeper;
use crate::domain::{
    new_controller_port_id, Acknowledgement, ChannelId, ConnectionId, IcaError, Order, Packet,
    PacketData, PortId,
};
use crate::ports::{ChannelOpenRequest, ChannelUpgradeRequest, IbcModule, UpgradableModule};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Controller-side channel module.
pub struct IcaControllerMiddleware {
    keeper: Arc<ControllerKeeper>,
    app: Option<Arc<dyn IbcModule>>,
}

impl IcaControllerMiddleware {
    /// Middleware with no underlying application.
    pub fn new(keeper: Arc<ControllerKeeper>) -> Self {
        Self { keeper, app: None }
    }

    /// Middleware forwarding callbacks to `app`.
    pub fn with_app(keeper: Arc<ControllerKeeper>, app: Arc<dyn IbcModule>) -> Self {
        Self {
            keeper,
            app: Some(app),
        }
    }

    /// Underlying keeper.
    pub fn keeper(&self) -> &Arc<ControllerKeeper> {
        &self.keeper
    }

    /// Register an interchain account on behalf of the underlying application.
    pub fn register_interchain_account(
        &self,
        connection_id: &str,
        owner: &str,
        version: &str,
        ordering: Order,
    ) -> Result<(PortId, ChannelId), IcaError> {
        self.keeper
            .register_interchain_account_with_middleware(connection_id, owner, version, ordering)
    }

    /// Send a packet on behalf of the underlying application.
    pub fn send_tx(
        &self,
        connection_id: &str,
        owner: &str,
        packet_data: &PacketData,
        timeout_timestamp: u64,
    ) -> Result<u64, IcaError> {
        let port_id = new_controller_port_id(owner)?;
        self.keeper
            .send_tx(connection_id, &port_id, packet_data, timeout_timestamp)
    }

    /// Application to forward to for `(port_id, connection_id)`, if any.
    fn forward_target(
        &self,
        port_id: &str,
        connection_id: &str,
    ) -> Result<Option<&Arc<dyn IbcModule>>, IcaError> {
        match &self.app {
            Some(app) if self.keeper.is_middleware_enabled(port_id, connection_id)? => Ok(Some(app)),
            _ => Ok(None),
        }
    }

    fn forward_for_channel(
        &self,
        port_id: &str,
        channel_id: &str,
    ) -> Result<Option<&Arc<dyn IbcModule>>, IcaError> {
        if self.app.is_none() {
            return Ok(None);
        }
        let connection_id = self.keeper.get_connection_id(port_id, channel_id)?;
        self.forward_target(port_id, &connection_id)
    }

    fn upgrade_target(
        &self,
        port_id: &str,
        connection_id: &str,
    ) -> Result<Option<&dyn UpgradableModule>, IcaError> {
        match self.forward_target(port_id, connection_id)? {
            None => Ok(None),
            Some(app) => app.as_upgradable().map(Some).ok_or_else(|| {
                IcaError::InvalidRequest(
                    "underlying application does not implement upgrade callbacks".to_string(),
                )
            }),
        }
    }
}

impl IbcModule for IcaControllerMiddleware {
    fn on_chan_open_init(&self, request: &ChannelOpenRequest) -> Result<String, IcaError> {
        self.keeper.ensure_enabled()?;
        let version = self.keeper.on_chan_open_init(request)?;

        let connection_id: &ConnectionId = &request.connection_hops[0];
        if let Some(app) = self.forward_target(&request.port_id, connection_id)? {
            let _ = app.on_chan_open_init(request)?;
        }
        Ok(version)
    }

    fn on_chan_open_try(&self, _request: &ChannelOpenRequest) -> Result<String, IcaError> {
        Err(IcaError::InvalidChannelFlow(
            "channel handshake must be initiated by controller chain".to_string(),
        ))
    }

    fn on_chan_open_ack(
        &self,
        port_id: &str,
        channel_id: &str,
        counterparty_channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), IcaError> {
        self.keeper.ensure_enabled()?;
        self.keeper
            .on_chan_open_ack(port_id, channel_id, counterparty_version)?;

        if let Some(app) = self.forward_for_channel(port_id, channel_id)? {
            app.on_chan_open_ack(port_id, channel_id, counterparty_channel_id, counterparty_version)?;
        }
        Ok(())
    }

    fn on_chan_open_confirm(&self, _port_id: &str, _channel_id: &str) -> Result<(), IcaError> {
        Err(IcaError::InvalidChannelFlow(
            "channel handshake must be initiated by controller chain".to_string(),
        ))
    }

    fn on_chan_close_init(&self, _port_id: &str, _channel_id: &str) -> Result<(), IcaError> {
        Err(IcaError::InvalidRequest("user cannot close channel".to_string()))
    }

    fn on_chan_close_confirm(&self, port_id: &str, channel_id: &str) -> Result<(), IcaError> {
        self.keeper.on_chan_close_confirm(port_id, channel_id)?;

        if let Some(app) = self.forward_for_channel(port_id, channel_id)? {
            app.on_chan_close_confirm(port_id, channel_id)?;
        }
        Ok(())
    }

    fn on_recv_packet(&self, packet: &Packet, _relayer: &str) -> Acknowledgement {
        let err = IcaError::InvalidChannelFlow("cannot receive packet on controller chain".to_string());
        error!(
            port_id = %packet.destination_port,
            channel_id = %packet.destination_channel,
            sequence = packet.sequence,
            "Rejected packet sent to controller chain"
        );
        Acknowledgement::error(&err)
    }

    fn on_acknowledgement_packet(
        &self,
        packet: &Packet,
        acknowledgement: &[u8],
        relayer: &str,
    ) -> Result<(), IcaError> {
        self.keeper.ensure_enabled()?;
        self.keeper.on_acknowledgement_packet(packet, acknowledgement)?;

        if let Some(app) = self.forward_for_channel(&packet.source_port, &packet.source_channel)? {
            app.on_acknowledgement_packet(packet, acknowledgement, relayer)?;
        }
        Ok(())
    }

    fn on_timeout_packet(&self, packet: &Packet, relayer: &str) -> Result<(), IcaError> {
        self.keeper.ensure_enabled()?;
        self.keeper.on_timeout_packet(packet)?;

        if let Some(app) = self.forward_for_channel(&packet.source_port, &packet.source_channel)? {
            app.on_timeout_packet(packet, relayer)?;
        }
        Ok(())
    }

    fn get_app_version(&self, port_id: &str, channel_id: &str) -> Option<String> {
        self.keeper.get_app_version(port_id, channel_id)
    }

    fn as_upgradable(&self) -> Option<&dyn UpgradableModule> {
        Some(self)
    }
}

impl UpgradableModule for IcaControllerMiddleware {
    fn on_chan_upgrade_init(&self, request: &ChannelUpgradeRequest) -> Result<String, IcaError> {
        self.keeper.ensure_enabled()?;
        let version = self.keeper.on_chan_upgrade_init(request)?;

        let connection_id = self
            .keeper
            .get_connection_id(&request.port_id, &request.channel_id)?;
        match self.upgrade_target(&request.port_id, &connection_id)? {
            Some(app) => {
                let forwarded = ChannelUpgradeRequest {
                    version,
                    ..request.clone()
                };
                app.on_chan_upgrade_init(&forwarded)
            }
            None => Ok(version),
        }
    }

    fn on_chan_upgrade_try(&self, _request: &ChannelUpgradeRequest) -> Result<String, IcaError> {
        Err(IcaError::InvalidChannelFlow(
            "channel upgrade handshake must be initiated by controller chain".to_string(),
        ))
    }

    fn on_chan_upgrade_ack(
        &self,
        port_id: &str,
        channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), IcaError> {
        self.keeper.ensure_enabled()?;
        self.keeper
            .on_chan_upgrade_ack(port_id, channel_id, counterparty_version)?;

        let connection_id = self.keeper.get_connection_id(port_id, channel_id)?;
        if let Some(app) = self.upgrade_target(port_id, &connection_id)? {
            app.on_chan_upgrade_ack(port_id, channel_id, counterparty_version)?;
        }
        Ok(())
    }

    fn on_chan_upgrade_open(
        &self,
        port_id: &str,
        channel_id: &str,
        proposed_order: Order,
        proposed_connection_hops: &[ConnectionId],
        proposed_version: &str,
    ) {
        let Some(connection_id) = proposed_connection_hops.first() else {
            return;
        };
        match self.upgrade_target(port_id, connection_id) {
            Ok(Some(app)) => app.on_chan_upgrade_open(
                port_id,
                channel_id,
                proposed_order,
                proposed_connection_hops,
                proposed_version,
            ),
            Ok(None) => debug!(port_id, channel_id, "Controller upgrade open"),
            Err(e) => warn!(port_id, channel_id, error = %e, "Upgrade open not forwarded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryTransport, ManualTimeSource, MemoryStore};
    use crate::config::ControllerParams;
    use crate::domain::{
        Capability, ChannelState, Counterparty, Encoding, Metadata, TxType, CONTROLLER_PORT_PREFIX,
        HOST_PORT_ID, VERSION,
    };
    use crate::ports::ChannelKeeper;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingApp {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingApp {
        fn record(&self, call: &str) {
            self.calls.lock().push(call.to_string());
        }
    }

    impl IbcModule for RecordingApp {
        fn on_chan_open_init(&self, _request: &ChannelOpenRequest) -> Result<String, IcaError> {
            self.record("open_init");
            Ok("ignored".to_string())
        }
        fn on_chan_open_try(&self, _request: &ChannelOpenRequest) -> Result<String, IcaError> {
            unreachable!()
        }
        fn on_chan_open_ack(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), IcaError> {
            self.record("open_ack");
            Ok(())
        }
        fn on_chan_open_confirm(&self, _: &str, _: &str) -> Result<(), IcaError> {
            unreachable!()
        }
        fn on_chan_close_init(&self, _: &str, _: &str) -> Result<(), IcaError> {
            unreachable!()
        }
        fn on_chan_close_confirm(&self, _: &str, _: &str) -> Result<(), IcaError> {
            self.record("close_confirm");
            Ok(())
        }
        fn on_recv_packet(&self, _: &Packet, _: &str) -> Acknowledgement {
            unreachable!()
        }
        fn on_acknowledgement_packet(&self, _: &Packet, _: &[u8], _: &str) -> Result<(), IcaError> {
            self.record("ack");
            Ok(())
        }
        fn on_timeout_packet(&self, _: &Packet, _: &str) -> Result<(), IcaError> {
            self.record("timeout");
            Ok(())
        }
    }

    struct Fixture {
        transport: Arc<InMemoryTransport>,
        middleware: Arc<IcaControllerMiddleware>,
        app: Arc<RecordingApp>,
    }

    fn fixture(enabled: bool) -> Fixture {
        let transport = Arc::new(InMemoryTransport::new("controller"));
        transport.add_connection("connection-0", "client-0", "connection-5");
        let keeper = Arc::new(ControllerKeeper::new(
            Arc::new(MemoryStore::new()),
            transport.clone(),
            Arc::new(transport.capability_registry().scope("icacontroller")),
            Arc::new(ManualTimeSource::new(0)),
            ControllerParams {
                controller_enabled: enabled,
            },
        ));
        let app = Arc::new(RecordingApp::default());
        let middleware = Arc::new(IcaControllerMiddleware::with_app(keeper, app.clone()));
        transport.bind_route(CONTROLLER_PORT_PREFIX, &middleware);
        Fixture {
            transport,
            middleware,
            app,
        }
    }

    #[test]
    fn test_forwarding_follows_middleware_flag() {
        let fx = fixture(true);

        let (port_id, channel_id) = fx
            .middleware
            .register_interchain_account("connection-0", "alice", "", Order::Ordered)
            .unwrap();
        assert_eq!(port_id, "icacontroller-alice");
        assert_eq!(*fx.app.calls.lock(), vec!["open_init".to_string()]);
        let channel = fx.transport.get_channel(&port_id, &channel_id).unwrap();
        assert_ne!(channel.version, "ignored");

        fx.middleware
            .keeper()
            .register_interchain_account("connection-0", "bob", "", Order::Ordered)
            .unwrap();
        assert_eq!(fx.app.calls.lock().len(), 1);

        fx.middleware.on_chan_close_confirm(&port_id, &channel_id).unwrap();
        assert_eq!(fx.app.calls.lock().len(), 2);
    }

    #[test]
    fn test_rejected_registration_keeps_middleware_flag() {
        let fx = fixture(true);
        let (port_id, channel_id) = fx
            .middleware
            .register_interchain_account("connection-0", "alice", "", Order::Ordered)
            .unwrap();
        fx.transport
            .set_channel_state(&port_id, &channel_id, ChannelState::Closed)
            .unwrap();

        let json = Metadata::new(
            VERSION,
            "connection-0",
            "connection-5",
            "",
            Encoding::Json,
            TxType::MultiMsg,
        )
        .encode()
        .unwrap();
        assert!(fx
            .middleware
            .keeper()
            .register_interchain_account("connection-0", "alice", &json, Order::Ordered)
            .is_err());
        assert!(fx
            .middleware
            .keeper()
            .is_middleware_enabled(&port_id, "connection-0")
            .unwrap());

        assert!(fx
            .middleware
            .keeper()
            .register_interchain_account("connection-0", "bob", "", Order::Unordered)
            .is_err());
        let registry = &fx.middleware.keeper().registry;
        assert!(!registry
            .is_middleware_enabled("icacontroller-bob", "connection-0")
            .unwrap());
        assert!(!registry
            .is_middleware_disabled("icacontroller-bob", "connection-0")
            .unwrap());
    }

    #[test]
    fn test_disabled_controller() {
        let fx = fixture(false);
        assert!(matches!(
            fx.middleware
                .register_interchain_account("connection-0", "alice", "", Order::Ordered),
            Err(IcaError::ControllerDisabled)
        ));
        assert!(matches!(
            fx.middleware.on_chan_open_ack("icacontroller-alice", "channel-0", "channel-1", "{}"),
            Err(IcaError::ControllerDisabled)
        ));
    }

    #[test]
    fn test_wrong_side_callbacks() {
        let fx = fixture(true);
        let request = ChannelOpenRequest {
            order: Order::Ordered,
            connection_hops: vec!["connection-0".into()],
            port_id: "icacontroller-alice".into(),
            channel_id: "channel-0".into(),
            channel_capability: Capability { index: 0 },
            counterparty: Counterparty::new(HOST_PORT_ID, Some("channel-1".into())),
            version: String::new(),
        };
        assert!(matches!(
            fx.middleware.on_chan_open_try(&request),
            Err(IcaError::InvalidChannelFlow(_))
        ));
        assert!(matches!(
            fx.middleware.on_chan_open_confirm("icacontroller-alice", "channel-0"),
            Err(IcaError::InvalidChannelFlow(_))
        ));
        assert!(matches!(
            fx.middleware.on_chan_close_init("icacontroller-alice", "channel-0"),
            Err(IcaError::InvalidRequest(_))
        ));

        let packet = Packet {
            sequence: 1,
            source_port: HOST_PORT_ID.into(),
            source_channel: "channel-1".into(),
            destination_port: "icacontroller-alice".into(),
            destination_channel: "channel-0".into(),
            data: vec![1],
            timeout_timestamp: 10,
        };
        assert!(!fx.middleware.on_recv_packet(&packet, "relayer").is_success());
    }

    #[test]
    fn test_upgrade_forwarding_requires_upgradable_app() {
        let fx = fixture(true);
        let (port_id, channel_id) = fx
            .middleware
            .register_interchain_account("connection-0", "alice", "", Order::Ordered)
            .unwrap();
        let version = fx.transport.app_version(&port_id, &channel_id).unwrap();

        let request = ChannelUpgradeRequest {
            port_id,
            channel_id,
            proposed_order: Order::Ordered,
            proposed_connection_hops: vec!["connection-0".into()],
            version,
        };
        assert!(matches!(
            fx.middleware.on_chan_upgrade_init(&request),
            Err(IcaError::InvalidRequest(_))
        ));
        assert!(matches!(
            fx.middleware.on_chan_upgrade_try(&request),
            Err(IcaError::InvalidChannelFlow(_))
        ));
    }
}
