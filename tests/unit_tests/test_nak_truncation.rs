// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use daemon_bridge::{
    constants::DEFAULT_MAX_NAK_TEXT_LEN,
    error::MEMORY_EXHAUSTED_PREFIX,
    registry::{ChannelRegistry, SendRequestOutcome},
    state_machine::ChannelState,
};

#[tokio::test]
async fn nak_text_within_bound_is_stored_verbatim() {
    let registry = ChannelRegistry::new();
    let record = registry.insert(1).expect("insert");
    record.set_state(ChannelState::InSendRequest).await;

    let text = format!("{MEMORY_EXHAUSTED_PREFIX} out of memory");
    record
        .complete_send_request(SendRequestOutcome::Fail(text.clone()))
        .await;

    let outcome = record.take_outcome().await.expect("outcome");
    assert_eq!(outcome, SendRequestOutcome::Fail(text));
}

#[tokio::test]
async fn oversized_nak_text_is_truncated_to_the_configured_bound() {
    let registry = ChannelRegistry::new();
    let record = registry.insert(1).expect("insert");
    record.set_state(ChannelState::InSendRequest).await;

    let oversized = "x".repeat(DEFAULT_MAX_NAK_TEXT_LEN * 2);
    record
        .complete_send_request(SendRequestOutcome::Fail(oversized))
        .await;

    let outcome = record.take_outcome().await.expect("outcome");
    match outcome {
        SendRequestOutcome::Fail(text) => {
            assert_eq!(text.len(), DEFAULT_MAX_NAK_TEXT_LEN);
        },
        SendRequestOutcome::Ok => panic!("expected Fail outcome"),
    }
}
