// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The server engine (§4.E): accepts a connection, answers service
//! selection (`INIT`/`CHANGE`) itself, queues `PREQ` frames, dispatches
//! them to a user handler, emits `ACK`/`NAK`, handles the out-of-band
//! `ABORT`/`EXIT` control packets.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    constants::{DEF_POLLTIME, DEFAULT_SERVICE_NAME},
    error::BridgeError,
    protocol::{
        CompressionCodec, ServiceDetails,
        codec::{frame, unframe},
        tag::PacketTag,
    },
    registry::ChannelId,
    server::handler::ServiceHandler,
    transport::{Transport, TransportEvent},
};

/// The two out-of-band signals the server's control sink is invoked with
/// (§4.E): `ABORT` on every occurrence, `EXIT` on `EXIT` or on a link
/// failure while not already shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Abort,
    Exit,
}

pub type ControlSink = Arc<dyn Fn(ControlEvent) + Send + Sync>;

/// The process-wide server record (§3 "Server record (process-wide)"):
/// active client channel id, incoming FIFO, shutdown flag, control sink,
/// user data handler — rewritten as an explicit, caller-owned value for
/// the same reason [`crate::client::session::ClientSession`] is (§9
/// "Global session state").
pub struct ServerEngine {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn CompressionCodec>,
    handler: Arc<dyn ServiceHandler>,
    control_sink: ControlSink,
    /// 0 ⇒ no client channel currently being served (invariant 5, §8).
    active_channel: AtomicU32,
    shutdown: AtomicBool,
    serving: AtomicBool,
    fifo: Mutex<VecDeque<(ChannelId, Bytes)>>,
}

impl ServerEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        codec: Arc<dyn CompressionCodec>,
        handler: Arc<dyn ServiceHandler>,
        control_sink: ControlSink,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            codec,
            handler,
            control_sink,
            active_channel: AtomicU32::new(0),
            shutdown: AtomicBool::new(false),
            serving: AtomicBool::new(false),
            fifo: Mutex::new(VecDeque::new()),
        })
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        match self.active_channel.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// `serve(optional port, optional service-name, ...)` (§4.E). Not
    /// re-entrant. Resolves the listen port (explicit port overrides
    /// service-name lookup), binds the listener, then runs the
    /// cooperative poll/dispatch loop until the shutdown flag is set.
    pub async fn serve(
        &self,
        bind_host: &str,
        port: Option<u16>,
        service_name: Option<&str>,
    ) -> Result<(), BridgeError> {
        if self.serving.swap(true, Ordering::AcqRel) {
            return Err(BridgeError::BadContext);
        }

        let resolved_port = match port {
            Some(p) => p,
            None => self
                .transport
                .resolve_service_port(service_name.unwrap_or(DEFAULT_SERVICE_NAME))?,
        };
        self.transport
            .listen(&format!("{bind_host}:{resolved_port}"))
            .await?;
        info!(%bind_host, port = resolved_port, "server listening");

        while !self.is_shutdown() {
            let events = self.transport.poll(DEF_POLLTIME).await;
            for event in events {
                self.handle_event(event).await;
            }

            if let Some((channel, payload)) = self.dequeue().await {
                self.dispatch(channel, payload).await;
            }
        }

        Ok(())
    }

    async fn dequeue(&self) -> Option<(ChannelId, Bytes)> {
        self.fifo.lock().await.pop_front()
    }

    /// Dispatches one dequeued `PREQ` payload to the user's
    /// [`ServiceHandler`] and replies `ACK`/`NAK` with whatever it returns.
    /// `INIT`/`CHANGE` never reach here — `handle_data` answers those
    /// itself (§4.E "service-selection path").
    async fn dispatch(&self, channel: ChannelId, payload: Bytes) {
        let mut error = String::new();
        match self.handler.handle(payload, &mut error).await {
            Ok(stream) => {
                if let Some(mut rx) = stream {
                    while let Some(chunk) = rx.recv().await {
                        self.send_frame(channel, PacketTag::Data, &chunk).await;
                    }
                }
                self.send_frame(channel, PacketTag::Ack, &[]).await;
            },
            Err(e) => {
                if error.is_empty() {
                    error = e.to_string();
                }
                warn!(channel, error = %error, "handler returned failure");
                self.send_frame(channel, PacketTag::Nak, error.as_bytes())
                    .await;
            },
        }
    }

    async fn send_frame(&self, channel: ChannelId, tag: PacketTag, payload: &[u8]) {
        match frame(self.codec.as_ref(), tag, payload) {
            Ok(wire) => {
                if let Err(e) = self.transport.send(channel, wire).await {
                    warn!(channel, error = %e, "failed to send reply frame");
                }
            },
            Err(e) => warn!(channel, error = %e, "failed to frame reply"),
        }
    }

    async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::NewService(id) => {
                debug!(channel = id, "new client channel");
                self.active_channel.store(id, Ordering::Release);
            },
            TransportEvent::Connected(_) => {},
            TransportEvent::ConnectFailed(_) => {},
            TransportEvent::LinkDown(id) => {
                warn!(channel = id, "link down (may still recover)");
            },
            TransportEvent::LinkFail(id) => {
                if !self.shutdown.swap(true, Ordering::AcqRel) {
                    (self.control_sink)(ControlEvent::Exit);
                }
                if self.active_channel.load(Ordering::Acquire) == id {
                    self.active_channel.store(0, Ordering::Release);
                }
            },
            TransportEvent::Data(id, bytes) => self.handle_data(id, bytes).await,
        }
    }

    async fn handle_data(&self, channel: ChannelId, bytes: Bytes) {
        let (tag, payload) = match unframe(self.codec.as_ref(), &bytes) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(channel, error = %e, "failed to decode inbound frame");
                self.send_frame(
                    channel,
                    PacketTag::Nak,
                    format!("decode error: {e}").as_bytes(),
                )
                .await;
                return;
            },
        };

        // Length-1 frames (tag only, no payload) are out-of-band and never
        // reach the FIFO (§4.E, §8 boundary behaviors).
        if payload.is_empty() && tag.is_out_of_band() {
            match tag {
                PacketTag::Abort => (self.control_sink)(ControlEvent::Abort),
                PacketTag::Exit => {
                    (self.control_sink)(ControlEvent::Exit);
                    self.shutdown.store(true, Ordering::Release);
                },
                _ => unreachable!("is_out_of_band only matches Abort/Exit"),
            }
            return;
        }

        // `INIT`/`CHANGE` are service selection, not a request: the engine
        // answers them itself with a bare ACK/NAK and never hands them to
        // the user's `ServiceHandler` (§4.E "service-selection path").
        // Only `PREQ` payloads reach the FIFO/dispatch path.
        match tag {
            PacketTag::Init | PacketTag::Change => {
                self.handle_service_selection(channel, payload).await;
            },
            _ => {
                self.fifo.lock().await.push_back((channel, payload));
            },
        }
    }

    /// Answers an `INIT`/`CHANGE` service-selection packet directly: `ACK`
    /// if the payload decodes as a valid `ServiceDetails`, `NAK` with the
    /// decode error otherwise. Grounded on `original_source/MDC/mdc_server.c`
    /// (`mdc_server.c:405,607`): the real selection handler replies without
    /// ever calling into the generic request (`fLinkDataCB`) handler.
    async fn handle_service_selection(&self, channel: ChannelId, payload: Bytes) {
        match ServiceDetails::from_bytes(&payload) {
            Ok(_details) => {
                debug!(channel, "service selection accepted");
                self.send_frame(channel, PacketTag::Ack, &[]).await;
            },
            Err(e) => {
                warn!(channel, error = %e, "service selection rejected");
                self.send_frame(channel, PacketTag::Nak, e.to_string().as_bytes())
                    .await;
            },
        }
    }
}
