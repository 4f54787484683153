// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An in-process [`Transport`] pair used by the test suite (see
//! `tests/integration_tests`) so the client/server engines can be exercised
//! end to end without real sockets or timing flakiness.
//!
//! [`LoopbackTransport::pair`] returns two transports wired directly to
//! each other: whatever one side `send`s the other observes as a `Data`
//! event on its next `poll`, with channel ids assigned independently on
//! each side, entirely at the transport's discretion.

use std::{
    net::IpAddr,
    sync::{
        Arc, Weak,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::{
    sync::{Mutex, mpsc},
    time::timeout,
};

use crate::{
    constants::DEFAULT_SERVICE_NAME,
    registry::ChannelId,
    transport::{Transport, TransportEvent, timer::TimerHandle},
};

pub struct LoopbackTransport {
    next_id: AtomicU32,
    /// This side's channel id -> the peer's channel id for the same
    /// logical connection.
    routes: DashMap<ChannelId, ChannelId>,
    peer: OnceCell<Weak<LoopbackTransport>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl LoopbackTransport {
    fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            next_id: AtomicU32::new(1),
            routes: DashMap::new(),
            peer: OnceCell::new(),
            events_tx,
            events_rx: Mutex::new(events_rx),
        })
    }

    /// Builds two transports wired to each other, conventionally called
    /// `client` and `server`.
    pub fn pair() -> (Arc<LoopbackTransport>, Arc<LoopbackTransport>) {
        let a = Self::new();
        let b = Self::new();
        let _ = a.peer.set(Arc::downgrade(&b));
        let _ = b.peer.set(Arc::downgrade(&a));
        (a, b)
    }

    fn peer(&self) -> Arc<LoopbackTransport> {
        self.peer
            .get()
            .expect("loopback transport always has a peer")
            .upgrade()
            .expect("peer transport outlives its pairing")
    }

    fn next_channel_id(&self) -> ChannelId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Called by the peer's `connect` to simulate an inbound connection:
    /// assigns a local id, wires the route back, and emits `NewService`.
    fn accept_incoming(&self, remote_id: ChannelId) -> ChannelId {
        let local_id = self.next_channel_id();
        self.routes.insert(local_id, remote_id);
        let _ = self.events_tx.send(TransportEvent::NewService(local_id));
        local_id
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, _host: &str, _port: u16) -> std::io::Result<ChannelId> {
        let local_id = self.next_channel_id();
        let peer = self.peer();
        let remote_id = peer.accept_incoming(local_id);
        self.routes.insert(local_id, remote_id);
        let _ = self.events_tx.send(TransportEvent::Connected(local_id));
        Ok(local_id)
    }

    async fn listen(&self, _addr: &str) -> std::io::Result<()> {
        // Inbound connections arrive via `accept_incoming`, driven by the
        // peer's `connect`; there is no separate bind step to simulate.
        Ok(())
    }

    async fn send(&self, channel: ChannelId, frame: Bytes) -> std::io::Result<()> {
        let remote_id = *self.routes.get(&channel).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("channel {channel} not connected"),
            )
        })?;
        let peer = self.peer();
        peer.events_tx
            .send(TransportEvent::Data(remote_id, frame))
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    async fn poll(&self, budget: Duration) -> Vec<TransportEvent> {
        let mut rx = self.events_rx.lock().await;
        let mut events = Vec::new();
        match timeout(budget, rx.recv()).await {
            Ok(Some(ev)) => events.push(ev),
            Ok(None) | Err(_) => return events,
        }
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    async fn release(&self, channel: ChannelId) {
        self.routes.remove(&channel);
    }

    fn resolve_ip(&self, _host: &str) -> std::io::Result<IpAddr> {
        Ok(IpAddr::from([127, 0, 0, 1]))
    }

    fn resolve_service_port(&self, name: &str) -> std::io::Result<u16> {
        match name {
            DEFAULT_SERVICE_NAME => Ok(7782),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unknown service name: {other}"),
            )),
        }
    }

    fn register_timer(&self, spec: crate::transport::timer::TimerSpec) -> TimerHandle {
        TimerHandle::spawn(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_delivers_new_service_and_connected() {
        let (client, server) = LoopbackTransport::pair();
        let client_id = client.connect("ignored", 0).await.expect("connect");

        let client_events = client.poll(Duration::from_millis(50)).await;
        assert!(
            client_events
                .iter()
                .any(|e| matches!(e, TransportEvent::Connected(id) if *id == client_id))
        );

        let server_events = server.poll(Duration::from_millis(50)).await;
        assert!(
            server_events
                .iter()
                .any(|e| matches!(e, TransportEvent::NewService(_)))
        );
    }

    #[tokio::test]
    async fn send_is_observed_by_the_peer() {
        let (client, server) = LoopbackTransport::pair();
        let client_id = client.connect("ignored", 0).await.expect("connect");
        let _ = client.poll(Duration::from_millis(50)).await;
        let server_events = server.poll(Duration::from_millis(50)).await;
        let TransportEvent::NewService(server_id) = server_events[0] else {
            panic!("expected NewService");
        };

        client
            .send(client_id, Bytes::from_static(b"hello"))
            .await
            .expect("send");

        let events = server.poll(Duration::from_millis(50)).await;
        assert!(events.iter().any(
            |e| matches!(e, TransportEvent::Data(id, b) if *id == server_id && b == "hello".as_bytes())
        ));
    }
}
