// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The process-wide session record (§3 "Session record (client,
//! process-wide)"), rewritten per the Design Notes (§9 "Global session
//! state") as an explicit, caller-owned value instead of a hidden global.
//! [`global`] provides a `once_cell`-backed singleton wrapper for callers
//! who want a "just call a free function" ergonomics instead of threading
//! a session value through their own code, per the Control API surface
//! table in §6.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    constants::{
        DEFAULT_NEW_SERVICE_TIMEOUT, DEFAULT_SEND_REQUEST_TIMEOUT,
        DEFAULT_SERVICE_REQUEST_TIMEOUT,
    },
    error::BridgeError,
    protocol::{CompressionCodec, IdentityCodec, codec::unframe, tag::PacketTag},
    registry::{ChannelId, ChannelRegistry},
    state_machine::{apply, dispatch},
    transport::{Transport, TransportEvent, tcp::TcpTransport},
};

/// The three per-phase timeouts carried on the session record (§3),
/// defaulting to 30000 / 10000 / 5400000 ms.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub new_service: Duration,
    pub service_request: Duration,
    pub send_request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            new_service: DEFAULT_NEW_SERVICE_TIMEOUT,
            service_request: DEFAULT_SERVICE_REQUEST_TIMEOUT,
            send_request: DEFAULT_SEND_REQUEST_TIMEOUT,
        }
    }
}

/// The recognized names for [`ClientSession::set_timeout`] (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutName {
    NewService,
    ServiceRequest,
    SendRequest,
}

impl TimeoutName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "NEW_SERVICE" => Some(TimeoutName::NewService),
            "SERVICE_REQUEST" => Some(TimeoutName::ServiceRequest),
            "SEND_REQUEST" => Some(TimeoutName::SendRequest),
            _ => None,
        }
    }
}

/// Bookkeeping guarded by the process-wide lock (§5): the pending-
/// connection id, the pending-service-reply id + its last reply tag, the
/// re-entrancy guard for `create_service`, and the configurable timeouts.
/// The channel registry itself is *not* behind this lock — it is a
/// lock-free `DashMap`, so registry reads/writes never contend with it.
pub(crate) struct Locked {
    pub(crate) pending_connection: ChannelId,
    pub(crate) connect_outcome: Option<bool>,
    pub(crate) pending_service_reply: ChannelId,
    pub(crate) last_service_reply_tag: Option<PacketTag>,
    pub(crate) creating_service: bool,
    pub(crate) timeouts: Timeouts,
}

/// The client-side driver: an explicit, caller-owned process-wide session
/// record, rather than a hidden global.
pub struct ClientSession {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) codec: Arc<dyn CompressionCodec>,
    pub(crate) registry: Arc<ChannelRegistry>,
    comms_mode: AtomicBool,
    locked: Mutex<Locked>,
    /// Serializes the public operations (§5: "a single process-wide mutex
    /// is acquired on entry to every public client operation and released
    /// on every return path"). Held only around a single call, never across
    /// `poll_and_dispatch`'s internal use of `locked`, so callbacks for
    /// other channels keep flowing while one call is waiting on its own.
    pub(crate) op_lock: Mutex<()>,
}

impl ClientSession {
    pub fn new(transport: Arc<dyn Transport>, codec: Arc<dyn CompressionCodec>) -> Self {
        Self::with_registry(transport, codec, ChannelRegistry::new())
    }

    /// Like [`ClientSession::new`], but caps stored NAK text at
    /// `max_nak_text_len` (e.g. `SessionConfig::max_nak_text_len` loaded
    /// from YAML, §6 "Configuration file") instead of the built-in default.
    pub fn with_max_nak_text_len(
        transport: Arc<dyn Transport>,
        codec: Arc<dyn CompressionCodec>,
        max_nak_text_len: usize,
    ) -> Self {
        Self::with_registry(
            transport,
            codec,
            ChannelRegistry::with_max_nak_text_len(max_nak_text_len),
        )
    }

    fn with_registry(
        transport: Arc<dyn Transport>,
        codec: Arc<dyn CompressionCodec>,
        registry: Arc<ChannelRegistry>,
    ) -> Self {
        Self {
            transport,
            codec,
            registry,
            comms_mode: AtomicBool::new(false),
            locked: Mutex::new(Locked {
                pending_connection: 0,
                connect_outcome: None,
                pending_service_reply: 0,
                last_service_reply_tag: None,
                creating_service: false,
                timeouts: Timeouts::default(),
            }),
            op_lock: Mutex::new(()),
        }
    }

    /// `start` (§6): idempotent init, flips comms-mode on. Returns
    /// `BadContext` if the session is already started.
    pub async fn start(&self) -> Result<(), BridgeError> {
        if self.comms_mode.swap(true, Ordering::AcqRel) {
            return Err(BridgeError::BadContext);
        }
        debug!("session started");
        Ok(())
    }

    /// `end` (§6): closes every surviving channel, then flips comms-mode
    /// off.
    pub async fn end(&self) -> Result<(), BridgeError> {
        if !self.comms_mode.swap(false, Ordering::AcqRel) {
            return Err(BridgeError::BadContext);
        }
        let _guard = self.op_lock.lock().await;
        for id in self.registry.for_each() {
            if let Err(e) = self.close_service_inner(id).await {
                warn!(channel = id, error = ?e, "close_service during end() failed");
            }
        }
        debug!("session ended");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.comms_mode.load(Ordering::Acquire)
    }

    /// `set_timeout` (§4.F): recognizes `NEW_SERVICE`, `SERVICE_REQUEST`,
    /// `SEND_REQUEST`; unknown names fail. Calling it twice with the same
    /// value is observably identical to calling it once (§8).
    pub async fn set_timeout(&self, name: &str, ms: u64) -> Result<()> {
        let Some(which) = TimeoutName::parse(name) else {
            bail!("unknown timeout name: {name}");
        };
        let mut locked = self.locked.lock().await;
        let duration = Duration::from_millis(ms);
        match which {
            TimeoutName::NewService => locked.timeouts.new_service = duration,
            TimeoutName::ServiceRequest => locked.timeouts.service_request = duration,
            TimeoutName::SendRequest => locked.timeouts.send_request = duration,
        }
        Ok(())
    }

    pub(crate) async fn timeouts(&self) -> Timeouts {
        self.locked.lock().await.timeouts
    }

    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, Locked> {
        self.locked.lock().await
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn codec(&self) -> &Arc<dyn CompressionCodec> {
        &self.codec
    }

    /// Drains whatever the transport delivered during `budget` and applies
    /// each event. Shared by every wait loop in `client/engine.rs` so DATA/
    /// ACK/NAK frames for *other* channels keep getting processed even
    /// while one particular call is blocked waiting on its own channel (no
    /// ordering is guaranteed across channels, per §5).
    pub(crate) async fn poll_and_dispatch(&self, budget: Duration) {
        let events = self.transport.poll(budget).await;
        for event in events {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(id) => {
                let mut locked = self.locked.lock().await;
                if locked.pending_connection == id {
                    locked.connect_outcome = Some(true);
                }
            },
            TransportEvent::ConnectFailed(id) => {
                let mut locked = self.locked.lock().await;
                if locked.pending_connection == id {
                    locked.connect_outcome = Some(false);
                }
            },
            TransportEvent::Data(id, bytes) => self.handle_data(id, bytes).await,
            TransportEvent::NewService(_) => {
                debug!("client ignores server-side NewService events");
            },
            TransportEvent::LinkDown(id) => {
                warn!(channel = id, "link down (may still recover)");
            },
            TransportEvent::LinkFail(id) => {
                if let Ok(record) = self.registry.lookup(id) {
                    record.mark_link_failed();
                }
                let mut locked = self.locked.lock().await;
                if locked.pending_connection == id {
                    locked.connect_outcome = Some(false);
                }
                if locked.pending_service_reply == id {
                    locked.pending_service_reply = 0;
                }
            },
        }
    }

    async fn handle_data(&self, id: ChannelId, bytes: bytes::Bytes) {
        // The pending-service-reply short-circuit (§4.C): a frame on the
        // channel currently awaiting an INIT/CHANGE reply is recorded by
        // tag only and never reaches the regular dispatch table.
        {
            let mut locked = self.locked.lock().await;
            if locked.pending_service_reply == id {
                match unframe(self.codec.as_ref(), &bytes) {
                    Ok((tag, _payload)) => {
                        locked.last_service_reply_tag = Some(tag);
                        locked.pending_service_reply = 0;
                        return;
                    },
                    Err(e) => {
                        warn!(channel = id, error = %e, "service-reply decode failed");
                        return;
                    },
                }
            }
        }

        let Ok(record) = self.registry.lookup(id) else {
            debug!(channel = id, "data event for unknown channel, dropping");
            return;
        };

        match unframe(self.codec.as_ref(), &bytes) {
            Ok((tag, payload)) => {
                let state = record.state().await;
                let action = dispatch(state, tag, payload);
                apply(&record, action).await;
            },
            Err(e) => warn!(channel = id, error = %e, "frame decode failed"),
        }
    }
}

static GLOBAL: Lazy<ClientSession> =
    Lazy::new(|| ClientSession::new(Arc::new(TcpTransport::new()), Arc::new(IdentityCodec)));

/// A legacy singleton wrapper around a default `ClientSession` (real TCP
/// transport, pass-through codec), for callers who want "just call a free
/// function" ergonomics from the control API surface (§6) without
/// threading a session value through their own code.
pub fn global() -> &'static ClientSession {
    &GLOBAL
}
