// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 6, §8: `end()` closes every surviving channel before it
//! returns; any later operation on those channels fails.

use std::sync::Arc;

use daemon_bridge::{error::BridgeError, protocol::ServiceDetails, server::EchoHandler};

use crate::integration_tests::common::{Harness, silent_control_sink};

#[tokio::test]
async fn end_closes_every_channel_and_later_calls_on_them_fail() {
    let harness = Harness::start(Arc::new(EchoHandler), silent_control_sink()).await;

    let id1 = harness
        .client
        .create_service("ignored", Some(0), ServiceDetails::SystemCommand)
        .await
        .expect("create_service 1");
    let id2 = harness
        .client
        .create_service("ignored", Some(0), ServiceDetails::SystemCommand)
        .await
        .expect("create_service 2");
    assert_ne!(id1, id2);

    harness.client.end().await.expect("end");

    let err1 = harness.client.get_status(id1).await.unwrap_err();
    let err2 = harness.client.get_status(id2).await.unwrap_err();
    assert!(matches!(err1, BridgeError::Fail(_)));
    assert!(matches!(err2, BridgeError::Fail(_)));
}
