// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 1, §8: `create_service` against a daemon that never answers
//! times out with `NoDaemon` and leaves no trace in the channel registry.

use std::{net::IpAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use daemon_bridge::{
    client::ClientSession,
    error::BridgeError,
    protocol::{IdentityCodec, ServiceDetails},
    registry::ChannelId,
    transport::{Transport, TransportEvent, timer::TimerHandle},
};

/// A transport whose `connect` never completes: no `Connected` or
/// `ConnectFailed` event is ever produced, simulating a daemon that never
/// answers.
struct DeafTransport;

#[async_trait]
impl Transport for DeafTransport {
    async fn connect(&self, _host: &str, _port: u16) -> std::io::Result<ChannelId> {
        Ok(1)
    }

    async fn listen(&self, _addr: &str) -> std::io::Result<()> {
        Ok(())
    }

    async fn send(&self, _channel: ChannelId, _frame: Bytes) -> std::io::Result<()> {
        Ok(())
    }

    async fn poll(&self, budget: Duration) -> Vec<TransportEvent> {
        tokio::time::sleep(budget).await;
        Vec::new()
    }

    async fn release(&self, _channel: ChannelId) {}

    fn resolve_ip(&self, _host: &str) -> std::io::Result<IpAddr> {
        Ok(IpAddr::from([10, 0, 0, 1]))
    }

    fn resolve_service_port(&self, _name: &str) -> std::io::Result<u16> {
        Ok(9999)
    }

    fn register_timer(&self, spec: daemon_bridge::transport::timer::TimerSpec) -> TimerHandle {
        TimerHandle::spawn(spec)
    }
}

#[tokio::test]
async fn connect_timeout_returns_no_daemon() {
    let session = ClientSession::new(Arc::new(DeafTransport), Arc::new(IdentityCodec));
    session.start().await.expect("session starts");
    // The per-phase timeout is caller-configurable (§4.F); a short value
    // here exercises the exact same `NoDaemon` path as the 30s production
    // default without slowing the test suite down.
    session
        .set_timeout("NEW_SERVICE", 50)
        .await
        .expect("set_timeout");

    let details = ServiceDetails::Sybase(daemon_bridge::protocol::service::DatabaseCredentials {
        user: "u".into(),
        password: "p".into(),
        server: "sv".into(),
        database: "db".into(),
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        session.create_service("10.0.0.1", Some(9999), details),
    )
    .await
    .expect("create_service itself must not hang past the wall-clock guard");

    assert!(matches!(result, Err(BridgeError::NoDaemon)));
}
