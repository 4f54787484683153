// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 2, §8: a peer that ACKs the service selection and answers a
//! `PREQ` with one `DATA` frame then `ACK`.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use daemon_bridge::{
    protocol::{ServiceDetails, service::DatabaseCredentials},
    server::EchoHandler,
};

use crate::integration_tests::common::{Harness, silent_control_sink};

#[tokio::test]
async fn sink_observes_the_echoed_data_then_get_result_completes_ok() {
    let harness = Harness::start(Arc::new(EchoHandler), silent_control_sink()).await;

    let details = ServiceDetails::Sybase(DatabaseCredentials {
        user: "u".into(),
        password: "p".into(),
        server: "sv".into(),
        database: "db".into(),
    });
    let channel = harness
        .client
        .create_service("ignored", Some(0), details)
        .await
        .expect("create_service");

    let received: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
    let received_for_sink = received.clone();
    let sink = Arc::new(move |_channel, bytes: Bytes| {
        received_for_sink.lock().expect("lock").push(bytes);
    });

    harness
        .client
        .send_request(channel, b"ping", sink)
        .await
        .expect("send_request");

    harness
        .client
        .get_result(channel)
        .await
        .expect("get_result ok");

    let frames = received.lock().expect("lock");
    assert_eq!(frames.len(), 1);
    assert_eq!(&frames[0][..], b"ping");
}
