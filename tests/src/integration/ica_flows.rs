//! # Interchain Accounts Flows
//!
//! End-to-end scenarios between a controller chain and a host chain:
//!
//! 1. **Registration**: open-init → open-try → open-ack → open-confirm
//! 2. **Execution**: send → receive → execute → acknowledge
//! 3. **Failure**: rejected batches leave host state untouched
//! 4. **Timeout**: the ordered channel closes and re-opens with the same account

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use qc_15_interchain_accounts::adapters::{balance, MsgSend, MSG_SEND_RESPONSE_TYPE_URL};
    use qc_15_interchain_accounts::domain::serialize_tx;
    use qc_15_interchain_accounts::{
        generate_address, Acknowledgement, AnyMsg, ChannelKeeper, ChannelState, ControllerParams,
        Encoding, HostParams, IcaError, Metadata, MsgRegisterInterchainAccount, Order,
        PacketData, TxMsgData, TxType, HOST_PORT_ID,
    };

    fn transfer(from: &str, to: &str, amount: u128) -> AnyMsg {
        MsgSend::new(from, to, amount).to_any().unwrap()
    }

    fn host_balance(harness: &IcaHarness, address: &str) -> u128 {
        balance(harness.host.store.as_ref(), address).unwrap()
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    #[test]
    fn test_register_and_open_channel() {
        let harness = IcaHarness::new();
        let account = harness.open_account("alice").unwrap();

        assert_eq!(account.port_id, "icacontroller-alice");
        assert_eq!(
            account.address,
            generate_address("qc", HOST_CONNECTION, &account.port_id)
        );

        let controller_end = harness
            .controller
            .transport
            .get_channel(&account.port_id, &account.controller_channel)
            .unwrap();
        let host_end = harness
            .host
            .transport
            .get_channel(HOST_PORT_ID, &account.host_channel)
            .unwrap();
        assert_eq!(controller_end.state, ChannelState::Open);
        assert_eq!(host_end.state, ChannelState::Open);
        assert_eq!(controller_end.version, host_end.version);

        let metadata = Metadata::decode(&host_end.version).unwrap();
        assert_eq!(metadata.controller_connection_id, CONTROLLER_CONNECTION);
        assert_eq!(metadata.host_connection_id, HOST_CONNECTION);
        assert_eq!(metadata.address, account.address);

        assert_eq!(
            harness
                .host
                .keeper
                .get_active_channel_id(HOST_CONNECTION, &account.port_id)
                .unwrap(),
            Some(account.host_channel.clone())
        );
        assert_eq!(harness.host.accounts.len(), 1);
    }

    #[test]
    fn test_second_registration_rejected_while_open() {
        let harness = IcaHarness::new();
        let account = harness.open_account("alice").unwrap();

        assert!(matches!(
            harness.register("alice"),
            Err(IcaError::ActiveChannelAlreadySet { channel_id, .. }) if channel_id == account.controller_channel
        ));
    }

    #[test]
    fn test_owners_get_distinct_accounts() {
        let harness = IcaHarness::new();
        let alice = harness.open_account("alice").unwrap();
        let bob = harness.open_account("bob").unwrap();

        assert_ne!(alice.address, bob.address);
        assert_ne!(alice.port_id, bob.port_id);
        assert_eq!(harness.host.keeper.get_all_interchain_accounts().unwrap().len(), 2);
        assert_eq!(harness.controller.keeper.get_all_active_channels().unwrap().len(), 2);
    }

    #[test]
    fn test_unordered_registration_rejected() {
        let harness = IcaHarness::new();
        let mut msg = MsgRegisterInterchainAccount::new("alice", CONTROLLER_CONNECTION);
        msg.ordering = Order::Unordered;

        assert!(matches!(
            harness.register_with(msg),
            Err(IcaError::InvalidChannelOrdering { .. })
        ));
    }

    #[test]
    fn test_controller_disabled_rejects_registration() {
        let harness = IcaHarness::with_params(
            ControllerParams {
                controller_enabled: false,
            },
            HostParams::default(),
        );
        assert!(matches!(
            harness.register("alice"),
            Err(IcaError::ControllerDisabled)
        ));
    }

    #[test]
    fn test_host_disabled_rejects_open_try() {
        let harness = IcaHarness::with_params(
            ControllerParams::default(),
            HostParams {
                host_enabled: false,
                ..HostParams::default()
            },
        );
        let (port_id, channel_id) = harness.register("alice").unwrap();
        assert!(matches!(
            harness.relay_handshake(&port_id, &channel_id),
            Err(IcaError::HostDisabled)
        ));
        assert!(harness.host.accounts.is_empty());
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    #[test]
    fn test_execute_transfer_end_to_end() {
        let harness = IcaHarness::new();
        let account = harness.open_account("alice").unwrap();
        harness.fund(&account.address, 1_000).unwrap();

        let packet = harness
            .send_msgs("alice", &[transfer(&account.address, "qc1bob", 250)])
            .unwrap();
        assert_eq!(packet.sequence, 1);

        let ack = harness.relay_packet(&packet).unwrap();
        let result = match ack {
            Acknowledgement::Result(result) => result,
            other => panic!("expected success acknowledgement, got {:?}", other),
        };
        let data = TxMsgData::from_bytes(&result).unwrap();
        assert_eq!(data.msg_responses.len(), 1);
        assert_eq!(data.msg_responses[0].type_url, MSG_SEND_RESPONSE_TYPE_URL);

        assert_eq!(host_balance(&harness, &account.address), 750);
        assert_eq!(host_balance(&harness, "qc1bob"), 250);
        assert!(harness
            .controller
            .transport
            .packet_commitment(&account.port_id, &account.controller_channel, 1)
            .is_none());
    }

    #[test]
    fn test_failed_batch_is_atomic() {
        let harness = IcaHarness::new();
        let account = harness.open_account("alice").unwrap();
        harness.fund(&account.address, 100).unwrap();

        let packet = harness
            .send_msgs(
                "alice",
                &[
                    transfer(&account.address, "qc1bob", 60),
                    transfer(&account.address, "qc1carol", 60),
                ],
            )
            .unwrap();
        let ack = harness.relay_packet(&packet).unwrap();
        assert!(!ack.is_success());
        assert_eq!(host_balance(&harness, &account.address), 100);
        assert_eq!(host_balance(&harness, "qc1bob"), 0);

        // The channel stays open after an error acknowledgement.
        let packet = harness
            .send_msgs("alice", &[transfer(&account.address, "qc1bob", 60)])
            .unwrap();
        assert_eq!(packet.sequence, 2);
        assert!(harness.relay_packet(&packet).unwrap().is_success());
        assert_eq!(host_balance(&harness, "qc1bob"), 60);
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let harness = IcaHarness::new();
        let alice = harness.open_account("alice").unwrap();
        let bob = harness.open_account("bob").unwrap();
        harness.fund(&bob.address, 100).unwrap();

        let packet = harness
            .send_msgs("alice", &[transfer(&bob.address, &alice.address, 100)])
            .unwrap();
        let ack = harness.relay_packet(&packet).unwrap();
        assert_eq!(
            ack,
            Acknowledgement::error(&IcaError::Unauthorized(String::new()))
        );
        assert_eq!(host_balance(&harness, &bob.address), 100);
    }

    #[test]
    fn test_allow_list_enforced() {
        let harness = IcaHarness::with_params(
            ControllerParams::default(),
            HostParams::allowing(["/gov.MsgVote"]),
        );
        let account = harness.open_account("alice").unwrap();
        harness.fund(&account.address, 10).unwrap();

        let packet = harness
            .send_msgs("alice", &[transfer(&account.address, "qc1bob", 5)])
            .unwrap();
        assert!(!harness.relay_packet(&packet).unwrap().is_success());

        harness.host.keeper.set_params(HostParams::default()).unwrap();
        let packet = harness
            .send_msgs("alice", &[transfer(&account.address, "qc1bob", 5)])
            .unwrap();
        assert!(harness.relay_packet(&packet).unwrap().is_success());
        assert_eq!(host_balance(&harness, "qc1bob"), 5);
    }

    #[test]
    fn test_host_disabled_returns_error_ack() {
        let harness = IcaHarness::new();
        let account = harness.open_account("alice").unwrap();
        harness.fund(&account.address, 10).unwrap();

        harness
            .host
            .keeper
            .set_params(HostParams {
                host_enabled: false,
                ..HostParams::default()
            })
            .unwrap();
        let packet = harness
            .send_msgs("alice", &[transfer(&account.address, "qc1bob", 5)])
            .unwrap();
        assert_eq!(
            harness.relay_packet(&packet).unwrap(),
            Acknowledgement::error(&IcaError::HostDisabled)
        );
        assert_eq!(host_balance(&harness, &account.address), 10);
    }

    #[test]
    fn test_json_encoded_channel() {
        let harness = IcaHarness::new();
        let mut msg = MsgRegisterInterchainAccount::new("alice", CONTROLLER_CONNECTION);
        msg.version = Metadata::new(
            "ics27-1",
            CONTROLLER_CONNECTION,
            HOST_CONNECTION,
            "",
            Encoding::Json,
            TxType::MultiMsg,
        )
        .encode()
        .unwrap();
        let (port_id, channel_id) = harness.register_with(msg).unwrap();
        harness.relay_handshake(&port_id, &channel_id).unwrap();

        let address = harness
            .controller
            .keeper
            .get_interchain_account_address("alice", CONTROLLER_CONNECTION)
            .unwrap()
            .unwrap();
        harness.fund(&address, 10).unwrap();

        let packet = harness
            .send_msgs("alice", &[transfer(&address, "qc1bob", 3)])
            .unwrap();
        assert!(harness.relay_packet(&packet).unwrap().is_success());

        // Bytes encoded for the other format do not decode on this channel.
        let data = serialize_tx(&[transfer(&address, "qc1bob", 3)], Encoding::Bincode).unwrap();
        let packet = harness
            .send_packet_data("alice", PacketData::execute_tx(data, ""), DEFAULT_TIMEOUT)
            .unwrap();
        assert!(!harness.relay_packet(&packet).unwrap().is_success());
        assert_eq!(host_balance(&harness, "qc1bob"), 3);
    }

    #[test]
    fn test_send_requires_open_channel() {
        let harness = IcaHarness::new();
        harness.register("alice").unwrap();
        let data = serialize_tx(&[], Encoding::Bincode).unwrap();
        assert!(matches!(
            harness.send_packet_data("alice", PacketData::execute_tx(data, ""), DEFAULT_TIMEOUT),
            Err(IcaError::ActiveChannelNotFound { .. })
        ));
    }

    // =========================================================================
    // TIMEOUT AND RE-OPEN
    // =========================================================================

    #[test]
    fn test_timeout_closes_channel_and_reopen_keeps_account() {
        let harness = IcaHarness::new();
        let first = harness.open_account("alice").unwrap();
        harness.fund(&first.address, 100).unwrap();

        let packet = harness
            .send_msgs("alice", &[transfer(&first.address, "qc1bob", 10)])
            .unwrap();
        harness.advance_time(DEFAULT_TIMEOUT + 1);
        assert!(matches!(
            harness.relay_packet(&packet),
            Err(IcaError::InvalidTimeoutTimestamp { .. })
        ));

        harness.relay_timeout(&packet).unwrap();
        assert!(harness
            .controller
            .keeper
            .is_active_channel_closed(CONTROLLER_CONNECTION, &first.port_id)
            .unwrap());
        assert!(matches!(
            harness.send_msgs("alice", &[transfer(&first.address, "qc1bob", 10)]),
            Err(IcaError::ActiveChannelNotFound { .. })
        ));
        assert_eq!(host_balance(&harness, &first.address), 100);

        let second = harness.open_account("alice").unwrap();
        assert_ne!(second.controller_channel, first.controller_channel);
        assert_ne!(second.host_channel, first.host_channel);
        assert_eq!(second.address, first.address);
        assert_eq!(harness.host.accounts.len(), 1);

        let packet = harness
            .send_msgs("alice", &[transfer(&second.address, "qc1bob", 10)])
            .unwrap();
        assert_eq!(packet.source_channel, second.controller_channel);
        assert!(harness.relay_packet(&packet).unwrap().is_success());
        assert_eq!(host_balance(&harness, "qc1bob"), 10);
    }

    #[test]
    fn test_reopen_with_different_metadata_rejected() {
        let harness = IcaHarness::new();
        let account = harness.open_account("alice").unwrap();
        let packet = harness.send_msgs("alice", &[]).unwrap();
        harness.advance_time(DEFAULT_TIMEOUT + 1);
        harness.relay_timeout(&packet).unwrap();

        let mut msg = MsgRegisterInterchainAccount::new("alice", CONTROLLER_CONNECTION);
        msg.version = Metadata::new(
            "ics27-1",
            CONTROLLER_CONNECTION,
            HOST_CONNECTION,
            "",
            Encoding::Json,
            TxType::MultiMsg,
        )
        .encode()
        .unwrap();
        assert!(matches!(
            harness.register_with(msg),
            Err(IcaError::InvalidVersion(_))
        ));
        assert_eq!(
            harness
                .controller
                .keeper
                .get_active_channel_id(CONTROLLER_CONNECTION, &account.port_id)
                .unwrap(),
            Some(account.controller_channel)
        );
    }
}
