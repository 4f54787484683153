// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use daemon_bridge::{error::BridgeError, registry::ChannelRegistry, state_machine::ChannelState};

#[tokio::test]
async fn legal_transition_chain_succeeds() {
    let registry = ChannelRegistry::new();
    let record = registry.insert(1).expect("insert");

    assert_eq!(record.state().await, ChannelState::MakingConn);

    record
        .transition(ChannelState::MakingConn, ChannelState::InServiceRequest)
        .await
        .expect("connect callback");
    record
        .transition(ChannelState::InServiceRequest, ChannelState::Idle)
        .await
        .expect("service-reply ACK");
    record
        .transition(ChannelState::Idle, ChannelState::InSendRequest)
        .await
        .expect("send_request");
    record.set_state(ChannelState::SendRequestComplete).await;
    record
        .transition(ChannelState::SendRequestComplete, ChannelState::Idle)
        .await
        .expect("get_result");
    record
        .transition(ChannelState::Idle, ChannelState::InChangeService)
        .await
        .expect("change_service");
    record
        .transition(ChannelState::InChangeService, ChannelState::Idle)
        .await
        .expect("change-service reply ACK");

    assert_eq!(record.state().await, ChannelState::Idle);
}

#[tokio::test]
async fn illegal_transition_fails_with_bad_context_and_leaves_state_unchanged() {
    let registry = ChannelRegistry::new();
    let record = registry.insert(1).expect("insert");

    let err = record
        .transition(ChannelState::Idle, ChannelState::InSendRequest)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::BadContext));
    assert_eq!(record.state().await, ChannelState::MakingConn);
}

#[tokio::test]
async fn send_request_complete_always_carries_a_defined_outcome() {
    use daemon_bridge::registry::SendRequestOutcome;

    let registry = ChannelRegistry::new();
    let record = registry.insert(1).expect("insert");
    record.set_state(ChannelState::InSendRequest).await;

    record
        .complete_send_request(SendRequestOutcome::Fail("M0000 out of memory".into()))
        .await;

    assert_eq!(record.state().await, ChannelState::SendRequestComplete);
    let outcome = record.take_outcome().await.expect("outcome recorded");
    assert_eq!(
        outcome,
        SendRequestOutcome::Fail("M0000 out of memory".into())
    );
}
