// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A `tokio::net::TcpStream`-backed [`Transport`] implementation.
//!
//! Message boundaries are not part of the wire format above this layer
//! (no other framing is applied once a frame reaches the protocol layer),
//! but a raw TCP stream has none of its own, so this transport imposes the
//! usual length-prefixed framing via
//! [`tokio_util::codec::LengthDelimitedCodec`] purely as a transport-level
//! concern — the protocol layer above never sees it.
//!
//! Each connection (client-initiated or server-accepted) gets a background
//! read task: the task owns the read half and forwards whatever it
//! decodes into a shared
//! `mpsc` channel that [`Transport::poll`] drains with a timeout. This is
//! what gives the engine its "poll for N ms, callbacks fire synchronously
//! within that poll" shape even though the implementation underneath is
//! fully asynchronous.

use std::{
    net::IpAddr,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
    time::timeout,
};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use crate::{
    constants::DEFAULT_SERVICE_NAME,
    registry::ChannelId,
    transport::{Transport, TransportEvent, timer::TimerHandle},
};

struct ChannelIo {
    writer: Mutex<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>>,
}

/// Real TCP-backed transport. One instance is shared between a client
/// session and/or a server listener. Every field the background read/
/// accept tasks need is independently cheap to clone (an `Arc`-wrapped map
/// and an `mpsc` sender), so `connect`/`listen` never need to smuggle
/// `self` into a `'static` task.
pub struct TcpTransport {
    next_id: AtomicU32,
    channels: Arc<DashMap<ChannelId, Arc<ChannelIo>>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            next_id: AtomicU32::new(1),
            channels: Arc::new(DashMap::new()),
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    fn next_channel_id(&self) -> ChannelId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn spawn_reader(
        channels: Arc<DashMap<ChannelId, Arc<ChannelIo>>>,
        tx: mpsc::UnboundedSender<TransportEvent>,
        id: ChannelId,
        read_half: OwnedReadHalf,
    ) {
        tokio::spawn(async move {
            let mut framed = FramedRead::new(read_half, LengthDelimitedCodec::new());
            loop {
                match framed.next().await {
                    Some(Ok(bytes)) => {
                        if tx.send(TransportEvent::Data(id, bytes.freeze())).is_err() {
                            break;
                        }
                    },
                    Some(Err(e)) => {
                        warn!(channel = id, error = %e, "transport read error");
                        channels.remove(&id);
                        let _ = tx.send(TransportEvent::LinkFail(id));
                        break;
                    },
                    None => {
                        debug!(channel = id, "peer closed connection");
                        channels.remove(&id);
                        let _ = tx.send(TransportEvent::LinkFail(id));
                        break;
                    },
                }
            }
        });
    }

    fn register_stream(
        channels: &Arc<DashMap<ChannelId, Arc<ChannelIo>>>,
        tx: &mpsc::UnboundedSender<TransportEvent>,
        id: ChannelId,
        stream: TcpStream,
    ) {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        channels.insert(
            id,
            Arc::new(ChannelIo {
                writer: Mutex::new(FramedWrite::new(
                    write_half,
                    LengthDelimitedCodec::new(),
                )),
            }),
        );
        Self::spawn_reader(channels.clone(), tx.clone(), id, read_half);
    }
}

#[async_trait]
impl Transport for TcpTransport {
    /// Begins connecting to `host:port`. The TCP handshake, read-task
    /// spawn and channel registration all happen inside the background
    /// task; `connect` itself only reserves the id and returns
    /// immediately, with completion observed via
    /// [`TransportEvent::Connected`] / [`TransportEvent::ConnectFailed`].
    async fn connect(&self, host: &str, port: u16) -> std::io::Result<ChannelId> {
        let id = self.next_channel_id();
        let host = host.to_string();
        let channels = self.channels.clone();
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            match TcpStream::connect((host.as_str(), port)).await {
                Ok(stream) => {
                    TcpTransport::register_stream(&channels, &tx, id, stream);
                    let _ = tx.send(TransportEvent::Connected(id));
                },
                Err(e) => {
                    warn!(%host, port, error = %e, "connect failed");
                    let _ = tx.send(TransportEvent::ConnectFailed(id));
                },
            }
        });

        Ok(id)
    }

    /// Binds `addr` and accepts connections in the background, registering
    /// each one and emitting [`TransportEvent::NewService`] as it arrives.
    async fn listen(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "server listening");

        let channels = self.channels.clone();
        let tx = self.events_tx.clone();
        let next_id = Arc::new(AtomicU32::new(self.next_id.load(Ordering::Relaxed)));

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        debug!(%peer, channel = id, "accepted connection");
                        TcpTransport::register_stream(&channels, &tx, id, stream);
                        if tx.send(TransportEvent::NewService(id)).is_err() {
                            break;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        break;
                    },
                }
            }
        });

        Ok(())
    }

    async fn send(&self, channel: ChannelId, frame: Bytes) -> std::io::Result<()> {
        let io = self.channels.get(&channel).map(|e| e.clone()).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("channel {channel} not registered"),
            )
        })?;
        let mut writer = io.writer.lock().await;
        writer
            .send(frame)
            .await
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
        self.channels.remove(&channel);
    }

    fn resolve_ip(&self, host: &str) -> std::io::Result<IpAddr> {
        use std::net::ToSocketAddrs;
        format!("{host}:0")
            .to_socket_addrs()?
            .next()
            .map(|a| a.ip())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("could not resolve {host}"),
                )
            })
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
