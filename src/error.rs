// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The closed error taxonomy every public client/server operation returns.
//!
//! Internal plumbing (codec, registry, transport glue) keeps using
//! `anyhow::Result` for flexibility; the engine layer converts into
//! [`BridgeError`] at the public boundary so callers never see a bare
//! `anyhow::Error`.

use thiserror::Error;

/// Failure returned when the received frame cannot be turned back into a
/// `(tag, payload)` pair.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The envelope decompressed to zero bytes, so there is no tag to read.
    #[error("decompressed frame is empty")]
    Empty,
    /// The first byte is not one of the recognized packet tags.
    #[error("unrecognized packet tag: 0x{0:02x}")]
    UnknownTag(u8),
}

/// The taxonomy from the control surface: every public operation returns one
/// of these kinds, nothing is thrown.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Generic failure; treat the channel as unusable unless the call
    /// explicitly left state intact.
    #[error("operation failed: {0}")]
    Fail(String),

    /// Connect attempt timed out with no socket-level response within
    /// `new-service-timeout`.
    #[error("no daemon answered within the connect timeout")]
    NoDaemon,

    /// The peer refused the service-selection packet.
    #[error("service selection rejected by peer")]
    ServiceNak,

    /// The peer processed the request and replied with a NAK.
    #[error("request rejected by peer: {0}")]
    SndReqNak(String),

    /// The API was called in the wrong lifecycle state: comms-mode off,
    /// channel in the wrong state, or re-entrant `create_service`.
    #[error("operation not valid in the current context")]
    BadContext,

    /// A frame could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The underlying transport failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for BridgeError {
    fn from(e: anyhow::Error) -> Self {
        BridgeError::Fail(e.to_string())
    }
}

/// Error-code prefix used by the reference deployment to flag memory
/// exhaustion inside a NAK's human-readable text (e.g. `M0000 out of
/// memory`).
pub const MEMORY_EXHAUSTED_PREFIX: &str = "M0000";
