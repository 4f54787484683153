// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client engine (§4.D): `create_service`, `change_service`,
//! `send_request`, `get_result`, `get_status`, `close_service`. Every
//! public operation here is serialized by [`ClientSession::op_lock`] and
//! returns one of the closed [`BridgeError`] kinds, never a bare
//! `anyhow::Error`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
    client::session::ClientSession,
    constants::{CS_SLEEP_TIME, SNDREQ_SLEEP_TIME, SR_SLEEP_TIME},
    error::BridgeError,
    protocol::{
        ServiceDetails,
        codec::frame,
        tag::PacketTag,
    },
    registry::{ChannelId, DataSink, SendRequestOutcome},
    state_machine::ChannelState,
};

impl ClientSession {
    /// `create_service(host, optional port, service-details)` (§4.D).
    ///
    /// Must not be re-entered while already creating a service; requires
    /// comms-mode on and no connection already pending.
    pub async fn create_service(
        &self,
        host: &str,
        port: Option<u16>,
        details: ServiceDetails,
    ) -> Result<ChannelId, BridgeError> {
        let _op = self.op_lock.lock().await;

        if !self.is_started() {
            return Err(BridgeError::BadContext);
        }

        {
            let mut locked = self.lock().await;
            if locked.creating_service || locked.pending_connection != 0 {
                return Err(BridgeError::BadContext);
            }
            locked.creating_service = true;
        }
        let result = self.create_service_body(host, port, details).await;
        self.lock().await.creating_service = false;
        result
    }

    async fn create_service_body(
        &self,
        host: &str,
        port: Option<u16>,
        details: ServiceDetails,
    ) -> Result<ChannelId, BridgeError> {
        let ip = self.transport().resolve_ip(host)?;
        let resolved_port = match port {
            Some(p) => p,
            None => self
                .transport()
                .resolve_service_port(crate::constants::DEFAULT_SERVICE_NAME)?,
        };

        let id = self
            .transport()
            .connect(&ip.to_string(), resolved_port)
            .await?;
        self.registry.insert(id).map_err(BridgeError::from)?;

        {
            let mut locked = self.lock().await;
            locked.pending_connection = id;
            locked.connect_outcome = None;
        }

        let timeout = self.timeouts().await.new_service;
        let connected = self.wait_for_connect(id, timeout).await;

        if !connected {
            self.teardown(id).await;
            let mut locked = self.lock().await;
            locked.pending_connection = 0;
            return Err(BridgeError::NoDaemon);
        }

        let record = self.registry.lookup(id).map_err(BridgeError::from)?;
        record
            .transition(ChannelState::MakingConn, ChannelState::InServiceRequest)
            .await?;

        let payload = details.to_bytes().map_err(BridgeError::from)?;
        let wire = frame(self.codec().as_ref(), PacketTag::Init, &payload)
            .map_err(BridgeError::from)?;

        {
            let mut locked = self.lock().await;
            locked.pending_service_reply = id;
            locked.last_service_reply_tag = None;
        }
        self.transport().send(id, wire).await?;

        let timeout = self.timeouts().await.service_request;
        match self.wait_for_service_reply(id, timeout).await {
            Some(PacketTag::Ack) => {
                record.set_service_details(details).await;
                record
                    .transition(ChannelState::InServiceRequest, ChannelState::Idle)
                    .await?;
                info!(channel = id, "service created");
                Ok(id)
            },
            Some(_) | None => {
                self.teardown(id).await;
                Err(BridgeError::ServiceNak)
            },
        }
    }

    /// `change_service(id, service-details)` (§4.D). The channel must be
    /// `Idle`; its id does not change.
    pub async fn change_service(
        &self,
        id: ChannelId,
        details: ServiceDetails,
    ) -> Result<ChannelId, BridgeError> {
        let _op = self.op_lock.lock().await;

        let record = self.registry.lookup(id).map_err(BridgeError::from)?;
        record
            .transition(ChannelState::Idle, ChannelState::InChangeService)
            .await?;

        let payload = details.to_bytes().map_err(BridgeError::from)?;
        let wire = frame(self.codec().as_ref(), PacketTag::Change, &payload)
            .map_err(BridgeError::from)?;

        {
            let mut locked = self.lock().await;
            locked.pending_service_reply = id;
            locked.last_service_reply_tag = None;
        }
        self.transport().send(id, wire).await?;

        let timeout = self.timeouts().await.service_request;
        match self.wait_for_service_reply(id, timeout).await {
            Some(PacketTag::Ack) => {
                record.set_service_details(details).await;
                record
                    .transition(ChannelState::InChangeService, ChannelState::Idle)
                    .await?;
                Ok(id)
            },
            Some(_) | None => {
                record.set_state(ChannelState::Idle).await;
                Err(BridgeError::ServiceNak)
            },
        }
    }

    /// `send_request(id, bytes, data-sink)` (§4.D). Returns immediately;
    /// completion is observed via `get_status`/`get_result`.
    pub async fn send_request(
        &self,
        id: ChannelId,
        payload: &[u8],
        sink: DataSink,
    ) -> Result<(), BridgeError> {
        let _op = self.op_lock.lock().await;

        let record = self.registry.lookup(id).map_err(BridgeError::from)?;
        record.set_data_sink(sink).await;
        record
            .transition(ChannelState::Idle, ChannelState::InSendRequest)
            .await?;

        let wire = frame(self.codec().as_ref(), PacketTag::Preq, payload)
            .map_err(BridgeError::from)?;
        self.transport().send(id, wire).await?;
        Ok(())
    }

    /// `get_result(id)` (§4.D). Blocks until the in-flight request
    /// completes, the link drops, or `send-request-timeout` expires.
    pub async fn get_result(&self, id: ChannelId) -> Result<(), BridgeError> {
        let _op = self.op_lock.lock().await;

        let record = self.registry.lookup(id).map_err(BridgeError::from)?;
        let state = record.state().await;

        if state != ChannelState::InSendRequest && state != ChannelState::SendRequestComplete {
            // Scenario 4, §8: calling get_result with no request in flight
            // is a Fail, not a BadContext.
            return Err(BridgeError::Fail(
                "no send-request in flight on this channel".to_string(),
            ));
        }

        let timeout = self.timeouts().await.send_request;
        let deadline = Instant::now() + timeout;
        loop {
            if record.is_link_failed() {
                return Err(BridgeError::Fail("link failed".to_string()));
            }
            if record.state().await == ChannelState::SendRequestComplete {
                break;
            }
            if Instant::now() >= deadline {
                return Err(BridgeError::Fail(
                    "send-request timed out".to_string(),
                ));
            }
            self.poll_and_dispatch(SNDREQ_SLEEP_TIME).await;
        }

        let outcome = record.take_outcome().await;
        record
            .transition(ChannelState::SendRequestComplete, ChannelState::Idle)
            .await?;

        match outcome {
            Some(SendRequestOutcome::Ok) | None => Ok(()),
            Some(SendRequestOutcome::Fail(text)) => Err(BridgeError::SndReqNak(text)),
        }
    }

    /// `get_status(id)` (§4.D): a single zero-wait poll, then reports
    /// whether the in-flight request has completed.
    pub async fn get_status(&self, id: ChannelId) -> Result<bool, BridgeError> {
        let _op = self.op_lock.lock().await;

        let record = self.registry.lookup(id).map_err(BridgeError::from)?;
        self.poll_and_dispatch(Duration::ZERO).await;

        match record.state().await {
            ChannelState::SendRequestComplete => Ok(true),
            ChannelState::InSendRequest => Ok(false),
            _ => Err(BridgeError::Fail(
                "channel has no send-request in flight".to_string(),
            )),
        }
    }

    /// `close_service(id)` (§4.D): best-effort `EXIT`, then tear the
    /// channel down. Any later operation on `id` fails with `Fail` (§8).
    pub async fn close_service(&self, id: ChannelId) -> Result<(), BridgeError> {
        let _op = self.op_lock.lock().await;
        self.close_service_inner(id).await
    }

    pub(crate) async fn close_service_inner(&self, id: ChannelId) -> Result<(), BridgeError> {
        self.registry.lookup(id).map_err(BridgeError::from)?;

        // Open question, §9: the exact on-wire EXIT length (1 vs 2 bytes)
        // is ambiguous in the source; a bare `frame(EXIT, &[])` produces a
        // 1-byte post-envelope packet, which every OOB-handling peer in
        // this crate accepts.
        if let Ok(wire) = frame(self.codec().as_ref(), PacketTag::Exit, &[]) {
            if let Err(e) = self.transport().send(id, wire).await {
                debug!(channel = id, error = %e, "best-effort EXIT send failed");
            }
        }

        self.teardown(id).await;
        Ok(())
    }

    async fn teardown(&self, id: ChannelId) {
        self.transport().release(id).await;
        self.registry.remove(id);
    }

    /// Polls until `id` leaves `pending_connection` (the connect callback
    /// cleared it) or `timeout` expires. Returns whether the connect
    /// succeeded.
    async fn wait_for_connect(&self, id: ChannelId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let locked = self.lock().await;
                if locked.pending_connection != id {
                    // Cleared by a LinkFail before any Connected/ConnectFailed.
                    return locked.connect_outcome.unwrap_or(false);
                }
                if let Some(outcome) = locked.connect_outcome {
                    drop(locked);
                    self.lock().await.pending_connection = 0;
                    return outcome;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.poll_and_dispatch(CS_SLEEP_TIME).await;
        }
    }

    /// Polls until the pending-service-reply short-circuit (§4.C) records a
    /// tag for `id`, or `timeout` expires.
    async fn wait_for_service_reply(
        &self,
        id: ChannelId,
        timeout: Duration,
    ) -> Option<PacketTag> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let locked = self.lock().await;
                if locked.pending_service_reply != id {
                    return locked.last_service_reply_tag;
                }
            }
            if Instant::now() >= deadline {
                warn!(channel = id, "service-reply wait timed out");
                return None;
            }
            self.poll_and_dispatch(SR_SLEEP_TIME).await;
        }
    }
}
