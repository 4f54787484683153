// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Channel state machine (§4.C): the legal transitions for one client
//! channel, and the table that decides what to do with a received frame
//! given the channel's current state.
//!
//! ```text
//!         create_service(init)
//! (none) ─────────────────────► MakingConn
//!                                  │ connect callback
//!                                  ▼
//!                             InServiceRequest
//!                                  │ service-reply ACK
//!                                  ▼
//!                                Idle ◄──────────────────┐
//!                send_request()  │  │  change_service()  │
//!                                ▼  ▼                    │
//!                       InSendRequest   InChangeService  │
//!          data/ACK/NAK │                │ service-reply │
//!                       ▼                ▼               │
//!            SendRequestComplete ────────────────────────┘
//!                       │ get_result() / get_status()
//!                       ▼
//!                     Idle
//! ```
//!
//! Terminal exits from any state are `close_service` or link failure, which
//! destroy the record rather than transition it (see
//! [`crate::registry::ChannelRegistry::remove`]).

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{protocol::tag::PacketTag, registry::ChannelRecord};

/// The states a client channel can occupy (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    MakingConn,
    InServiceRequest,
    Idle,
    InChangeService,
    InSendRequest,
    SendRequestComplete,
}

/// What the receive path should do with one inbound frame on a channel,
/// decided purely from the dispatch table in §4.C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    /// `ACK` while `InSendRequest`: outcome <- ok.
    RequestAck,
    /// `NAK` while `InSendRequest`: outcome <- fail, with the NAK text.
    RequestNak(String),
    /// `DATA` while `InSendRequest`: hand the payload to the user sink.
    Data(Bytes),
    /// Anything else: log and drop.
    Drop,
}

/// Applies the §4.C dispatch table to one received `(tag, payload)` pair,
/// given the channel's current state. Does not mutate the record; the
/// caller applies the resulting action (so this function stays a pure,
/// easily-tested decision).
pub fn dispatch(state: ChannelState, tag: PacketTag, payload: Bytes) -> DispatchAction {
    match (state, tag) {
        (ChannelState::InSendRequest, PacketTag::Ack) => DispatchAction::RequestAck,
        (ChannelState::InSendRequest, PacketTag::Nak) => {
            let text = String::from_utf8_lossy(&payload).into_owned();
            DispatchAction::RequestNak(text)
        },
        (ChannelState::InSendRequest, PacketTag::Data) => DispatchAction::Data(payload),
        _ => {
            debug!(?state, ?tag, "dropping frame not valid for current state");
            DispatchAction::Drop
        },
    }
}

/// Applies a [`DispatchAction`] to the record: updates state/outcome and
/// invokes the user data sink. Invariant 2 (§8): the sink is only ever
/// invoked while `state == InSendRequest`, which holds here because
/// `dispatch` only produces `Data` from that state.
pub async fn apply(record: &ChannelRecord, action: DispatchAction) {
    match action {
        DispatchAction::RequestAck => {
            record
                .complete_send_request(crate::registry::SendRequestOutcome::Ok)
                .await;
        },
        DispatchAction::RequestNak(text) => {
            record
                .complete_send_request(crate::registry::SendRequestOutcome::Fail(text))
                .await;
        },
        DispatchAction::Data(payload) => {
            if let Some(sink) = record.data_sink().await {
                sink(record.id, payload);
            } else {
                warn!(channel = record.id, "DATA frame with no registered sink");
            }
        },
        DispatchAction::Drop => {},
    }
}
