// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The stream-socket transport collaborator (§4.0, out of scope per the
//! spec but modeled as a real trait boundary rather than hard-coded TCP
//! calls).
//!
//! The engine never talks to a socket directly: it only ever calls through
//! [`Transport`], and only ever observes the network via [`TransportEvent`]
//! delivered from [`Transport::poll`]. This is what lets the client/server
//! engines in this crate stay oblivious to whether they are driving real
//! TCP sockets ([`tcp::TcpTransport`]) or an in-process loopback used by
//! tests.

pub mod loopback;
pub mod tcp;
pub mod timer;

use std::{net::IpAddr, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::registry::ChannelId;

pub use timer::{TimerHandle, TimerMode};

/// Events the transport delivers to the engine. Each call to
/// [`Transport::poll`] drains whatever happened during that poll window —
/// a "callback-driven delivery, but synchronous within one poll" shape.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A pending `connect` completed; the channel is now live.
    Connected(ChannelId),
    /// A connection attempt failed outright (e.g. refused).
    ConnectFailed(ChannelId),
    /// A frame arrived on `channel`, already through the compression
    /// envelope's transport-level framing (the protocol-level envelope is
    /// still the caller's job to unwrap).
    Data(ChannelId, Bytes),
    /// A new client connected to a server-side listener.
    NewService(ChannelId),
    /// The link reported a transient problem; it may still recover.
    LinkDown(ChannelId),
    /// The link failed permanently; the channel is no longer usable.
    LinkFail(ChannelId),
}

/// The stream-socket transport contract. See module docs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin connecting to `host:port`. Returns the id the transport has
    /// assigned the channel; the connection itself completes
    /// asynchronously and is observed via [`TransportEvent::Connected`].
    async fn connect(&self, host: &str, port: u16) -> std::io::Result<ChannelId>;

    /// Start listening for inbound connections on `addr`. Accepted
    /// connections are observed via [`TransportEvent::NewService`].
    async fn listen(&self, addr: &str) -> std::io::Result<()>;

    /// Send one already-enveloped frame on `channel`.
    async fn send(&self, channel: ChannelId, frame: Bytes) -> std::io::Result<()>;

    /// Block for up to `budget`, then return whatever [`TransportEvent`]s
    /// arrived during that window (possibly none).
    async fn poll(&self, budget: Duration) -> Vec<TransportEvent>;

    /// Release the transport-side resources for `channel` (closes the
    /// socket). Idempotent.
    async fn release(&self, channel: ChannelId);

    /// Resolve a hostname to an address.
    fn resolve_ip(&self, host: &str) -> std::io::Result<IpAddr>;

    /// Resolve a well-known service name to a port (e.g. `/etc/services`
    /// style lookup). The default service name is `vdwd`.
    fn resolve_service_port(&self, name: &str) -> std::io::Result<u16>;

    /// Passthrough for §4.F's `timer_cb`: register a periodic/one-shot/off
    /// timer with the transport's own timer registry.
    fn register_timer(&self, spec: timer::TimerSpec) -> TimerHandle;
}
