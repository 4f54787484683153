// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 4, §8: calling `get_result` with no preceding `send_request`
//! returns `Fail`, not `BadContext`.

use std::sync::Arc;

use daemon_bridge::{error::BridgeError, protocol::ServiceDetails, server::EchoHandler};

use crate::integration_tests::common::{Harness, silent_control_sink};

#[tokio::test]
async fn get_result_without_a_request_in_flight_is_fail() {
    let harness = Harness::start(Arc::new(EchoHandler), silent_control_sink()).await;

    let channel = harness
        .client
        .create_service("ignored", Some(0), ServiceDetails::SystemCommand)
        .await
        .expect("create_service");

    let err = harness.client.get_result(channel).await.unwrap_err();
    assert!(matches!(err, BridgeError::Fail(_)));
}
