// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use daemon_bridge::{
    client::ClientSession,
    protocol::IdentityCodec,
    server::{ControlEvent, ControlSink, ServerEngine, ServiceHandler},
    transport::loopback::LoopbackTransport,
};
use tokio::sync::mpsc;

/// Wires a [`ClientSession`] to a [`ServerEngine`] over an in-process
/// [`LoopbackTransport`] pair and starts the server's poll/dispatch loop in
/// the background, mirroring how the six numbered scenarios in the
/// specification's Testable Properties section are driven without a real
/// socket.
pub struct Harness {
    pub client: ClientSession,
    pub server: Arc<ServerEngine>,
}

impl Harness {
    pub async fn start(handler: Arc<dyn ServiceHandler>, control_sink: ControlSink) -> Self {
        let (client_transport, server_transport) = LoopbackTransport::pair();

        let server = ServerEngine::new(
            server_transport,
            Arc::new(IdentityCodec),
            handler,
            control_sink,
        );
        let server_task = server.clone();
        tokio::spawn(async move {
            let _ = server_task.serve("ignored", Some(0), None).await;
        });

        let client = ClientSession::new(client_transport, Arc::new(IdentityCodec));
        client.start().await.expect("client session starts");

        Self { client, server }
    }
}

pub fn silent_control_sink() -> ControlSink {
    Arc::new(|_event: ControlEvent| {})
}

struct NotReachedHandler;

#[async_trait]
impl ServiceHandler for NotReachedHandler {
    async fn handle(
        &self,
        _request: Bytes,
        _error: &mut String,
    ) -> anyhow::Result<Option<mpsc::Receiver<Bytes>>> {
        panic!("handler invoked for a frame that should have stayed out-of-band");
    }
}

/// A handler that panics if ever invoked, used by tests that assert a
/// frame never reaches the server's FIFO/dispatch path at all.
pub fn not_reached_handler() -> Arc<dyn ServiceHandler> {
    Arc::new(NotReachedHandler)
}
