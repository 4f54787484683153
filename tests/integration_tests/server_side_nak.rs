// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 3, §8: a handler that NAKs the request; `get_result` must
//! surface `SndReqNak` carrying the handler's error text.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use daemon_bridge::{
    error::BridgeError,
    protocol::ServiceDetails,
    server::ServiceHandler,
};
use tokio::sync::mpsc;

use crate::integration_tests::common::{Harness, silent_control_sink};

struct OutOfMemoryHandler;

#[async_trait]
impl ServiceHandler for OutOfMemoryHandler {
    async fn handle(
        &self,
        _request: Bytes,
        error: &mut String,
    ) -> anyhow::Result<Option<mpsc::Receiver<Bytes>>> {
        error.push_str("M0000 out of memory");
        Err(anyhow::anyhow!("out of memory"))
    }
}

#[tokio::test]
async fn get_result_surfaces_the_nak_text() {
    let harness = Harness::start(Arc::new(OutOfMemoryHandler), silent_control_sink()).await;

    let channel = harness
        .client
        .create_service("ignored", Some(0), ServiceDetails::SystemCommand)
        .await
        .expect("create_service");

    let sink = Arc::new(|_channel, _bytes: Bytes| {});
    harness
        .client
        .send_request(channel, b"request", sink)
        .await
        .expect("send_request");

    let err = harness.client.get_result(channel).await.unwrap_err();
    match err {
        BridgeError::SndReqNak(text) => assert_eq!(text, "M0000 out of memory"),
        other => panic!("expected SndReqNak, got {other:?}"),
    }
}
