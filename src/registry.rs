// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Channel registry (§4.B): a keyed store of per-channel state records.
//!
//! Backed by a [`DashMap`] for lock-free concurrent access. No ordering
//! is exposed; `for_each` exists only for shutdown.

use std::sync::Arc;

use anyhow::{Result, bail};
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};

use crate::{
    constants::DEFAULT_MAX_NAK_TEXT_LEN,
    error::BridgeError,
    protocol::ServiceDetails,
    state_machine::ChannelState,
};

/// Channel id assigned by the transport; stable for the channel lifetime.
///
/// For the TCP transport this is a monotonically-increasing counter rather
/// than e.g. the local ephemeral port, since the port is not stable across
/// reconnects. This is explicitly a transport-level implementation choice,
/// not part of the wire protocol.
pub type ChannelId = u32;

/// The outcome of the most recently completed send-request on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendRequestOutcome {
    Ok,
    Fail(String),
}

/// A user-supplied sink invoked for each `DATA` frame received while a
/// channel is `InSendRequest` (§3, "Channel record (client side)").
pub type DataSink = Arc<dyn Fn(ChannelId, bytes::Bytes) + Send + Sync>;

/// Per-channel mutable state (§3 "Channel record"), guarded by its own
/// mutex so the receive path and the client wait loop can touch the record
/// without contending on the registry or the session lock.
pub struct ChannelRecord {
    pub id: ChannelId,
    inner: Mutex<Inner>,
    /// Signalled whenever `inner` changes state, so waiters can avoid a
    /// busy-poll and instead wake as soon as something happens.
    pub notify: Notify,
    /// Set once the transport reports `LinkFail` for this channel. Checked
    /// by every client wait loop, which aborts with `Fail` as soon as it is
    /// observed (§5, "Cancellation").
    link_failed: std::sync::atomic::AtomicBool,
    /// The configured cap on stored NAK text (§3 "NAK payload"), inherited
    /// from the [`ChannelRegistry`] that created this record.
    max_nak_text_len: usize,
}

struct Inner {
    state: ChannelState,
    data_sink: Option<DataSink>,
    outcome: Option<SendRequestOutcome>,
    service_details: Option<ServiceDetails>,
}

impl ChannelRecord {
    fn new(id: ChannelId, max_nak_text_len: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            inner: Mutex::new(Inner {
                state: ChannelState::MakingConn,
                data_sink: None,
                outcome: None,
                service_details: None,
            }),
            notify: Notify::new(),
            link_failed: std::sync::atomic::AtomicBool::new(false),
            max_nak_text_len,
        })
    }

    pub fn mark_link_failed(&self) {
        self.link_failed
            .store(true, std::sync::atomic::Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_link_failed(&self) -> bool {
        self.link_failed.load(std::sync::atomic::Ordering::Acquire)
    }

    pub async fn state(&self) -> ChannelState {
        self.inner.lock().await.state
    }

    pub async fn set_state(&self, state: ChannelState) {
        self.inner.lock().await.state = state;
        self.notify.notify_waiters();
    }

    /// Enforces a legal client-side transition (§4.C): fails with
    /// `BadContext` if `from` does not match the current state.
    pub async fn transition(
        &self,
        from: ChannelState,
        to: ChannelState,
    ) -> Result<(), BridgeError> {
        let mut guard = self.inner.lock().await;
        if guard.state != from {
            return Err(BridgeError::BadContext);
        }
        guard.state = to;
        drop(guard);
        self.notify.notify_waiters();
        Ok(())
    }

    pub async fn set_data_sink(&self, sink: DataSink) {
        self.inner.lock().await.data_sink = Some(sink);
    }

    pub async fn data_sink(&self) -> Option<DataSink> {
        self.inner.lock().await.data_sink.clone()
    }

    pub async fn set_service_details(&self, details: ServiceDetails) {
        self.inner.lock().await.service_details = Some(details);
    }

    /// Records the outcome of a completed send-request (ACK or NAK) and
    /// moves the channel to `SendRequestComplete` in one atomic step, so a
    /// waiter observing the state transition always sees a consistent
    /// outcome (invariant 1, §8). A NAK's text is truncated to the bounded
    /// NAK buffer size (§3 "Channel record (client side)") before it is
    /// stored, so whatever a waiter later reads via `take_outcome` already
    /// respects that bound.
    pub async fn complete_send_request(&self, outcome: SendRequestOutcome) {
        let mut guard = self.inner.lock().await;
        let outcome = match outcome {
            SendRequestOutcome::Fail(text) => {
                SendRequestOutcome::Fail(truncate_nak(&text, self.max_nak_text_len))
            },
            ok @ SendRequestOutcome::Ok => ok,
        };
        guard.outcome = Some(outcome);
        guard.state = ChannelState::SendRequestComplete;
        drop(guard);
        self.notify.notify_waiters();
    }

    pub async fn take_outcome(&self) -> Option<SendRequestOutcome> {
        self.inner.lock().await.outcome.take()
    }
}

fn truncate_nak(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        text.chars().take(max_len).collect()
    }
}

/// Returned by [`ChannelRegistry::insert`] when the id is already live.
#[derive(Debug, thiserror::Error)]
#[error("channel {0} already registered")]
pub struct DuplicateChannel(pub ChannelId);

/// Returned by [`ChannelRegistry::lookup`]/`remove` when the id is unknown.
#[derive(Debug, thiserror::Error)]
#[error("channel {0} not found")]
pub struct NotFound(pub ChannelId);

/// Keyed store of live channel records (§4.B). Concurrent access is
/// lock-free; the process-wide session lock (§5) only needs to serialize
/// the session-level bookkeeping (pending-connection/service-reply ids),
/// not registry reads/writes.
pub struct ChannelRegistry {
    channels: DashMap<ChannelId, Arc<ChannelRecord>>,
    /// The configured NAK-text bound (§6 "MaxNakTextLen") handed to every
    /// record this registry creates.
    max_nak_text_len: usize,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self {
            channels: DashMap::new(),
            max_nak_text_len: DEFAULT_MAX_NAK_TEXT_LEN,
        }
    }
}

impl ChannelRegistry {
    /// A registry using the built-in default NAK-text bound
    /// (`DEFAULT_MAX_NAK_TEXT_LEN`).
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A registry whose records cap stored NAK text at `max_nak_text_len`,
    /// e.g. `SessionConfig::max_nak_text_len` loaded from YAML (§6
    /// "Configuration file").
    pub fn with_max_nak_text_len(max_nak_text_len: usize) -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            max_nak_text_len,
        })
    }

    pub fn insert(&self, id: ChannelId) -> Result<Arc<ChannelRecord>> {
        if self.channels.contains_key(&id) {
            bail!(DuplicateChannel(id));
        }
        let record = ChannelRecord::new(id, self.max_nak_text_len);
        self.channels.insert(id, record.clone());
        Ok(record)
    }

    pub fn lookup(&self, id: ChannelId) -> Result<Arc<ChannelRecord>> {
        self.channels
            .get(&id)
            .map(|r| r.clone())
            .ok_or_else(|| NotFound(id).into())
    }

    /// Tears down the record. Releasing the transport side is the caller's
    /// responsibility (the registry has no transport handle of its own).
    pub fn remove(&self, id: ChannelId) -> Option<Arc<ChannelRecord>> {
        self.channels.remove(&id).map(|(_, v)| v)
    }

    /// All live channel ids, used only by shutdown (`end`) to close every
    /// surviving channel. No other ordering is exposed.
    pub fn for_each(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|e| *e.key()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }
}
