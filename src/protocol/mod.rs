// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The wire protocol: packet tags, the compression envelope, and the
//! service-selection payload carried inside `INIT`/`CHANGE` packets.

pub mod codec;
pub mod service;
pub mod tag;

pub use codec::{CompressionCodec, IdentityCodec, frame, unframe};
pub use service::{ServiceDetails, ServiceKind};
pub use tag::PacketTag;
