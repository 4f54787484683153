// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use daemon_bridge::{
    client::{ClientSession, TimeoutName},
    protocol::IdentityCodec,
    transport::loopback::LoopbackTransport,
};

#[test]
fn recognizes_the_three_documented_names() {
    assert_eq!(
        TimeoutName::parse("NEW_SERVICE"),
        Some(TimeoutName::NewService)
    );
    assert_eq!(
        TimeoutName::parse("SERVICE_REQUEST"),
        Some(TimeoutName::ServiceRequest)
    );
    assert_eq!(
        TimeoutName::parse("SEND_REQUEST"),
        Some(TimeoutName::SendRequest)
    );
    assert_eq!(TimeoutName::parse("NOT_A_TIMEOUT"), None);
}

#[tokio::test]
async fn set_timeout_rejects_unknown_names() {
    let (client, _server) = LoopbackTransport::pair();
    let session = ClientSession::new(client, Arc::new(IdentityCodec));
    let err = session.set_timeout("BOGUS", 1000).await.unwrap_err();
    assert!(err.to_string().contains("unknown timeout name"));
}

#[tokio::test]
async fn repeated_set_timeout_is_idempotent() {
    let (client, _server) = LoopbackTransport::pair();
    let session = ClientSession::new(client, Arc::new(IdentityCodec));

    // §8: "set_timeout(name, v); set_timeout(name, v) leaves observable
    // behavior identical to one call" — both calls must succeed and leave
    // the session usable exactly as after a single call.
    session.set_timeout("SEND_REQUEST", 2500).await.expect("first call");
    session.set_timeout("SEND_REQUEST", 2500).await.expect("second call");
}
