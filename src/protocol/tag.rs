// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The single tag byte that opens every packet.
//!
//! ```text
//! +--------+-----------------------------+
//! | tag(1) |         payload(N)          |
//! +--------+-----------------------------+
//! ```
//!
//! The tag is read only *after* the compression envelope has been reversed
//! (see [`crate::protocol::codec`]); it is never itself compressed
//! separately from the payload.

use thiserror::Error;

/// Returned when a byte does not correspond to any recognized packet tag.
#[derive(Debug, Error)]
#[error("unrecognized packet tag: 0x{0:02x}")]
pub struct UnknownTag(pub u8);

/// The eight packet kinds the protocol recognizes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketTag {
    /// Positive comms reply: service selected, or request completed ok.
    Ack = b'A',
    /// Out-of-band abort, single-byte packet.
    Abort = b'B',
    /// Change-service command.
    Change = b'C',
    /// Data frame delivered asynchronously while a request is in flight.
    Data = b'D',
    /// Out-of-band exit, single-byte packet.
    Exit = b'E',
    /// Service initialization (login) request.
    Init = b'I',
    /// Negative comms reply, carries human-readable error text.
    Nak = b'N',
    /// Process-request command.
    Preq = b'P',
}

impl PacketTag {
    /// True for the two out-of-band tags that bypass the server's FIFO.
    #[inline]
    pub fn is_out_of_band(self) -> bool {
        matches!(self, PacketTag::Abort | PacketTag::Exit)
    }
}

impl TryFrom<u8> for PacketTag {
    type Error = UnknownTag;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            b'A' => PacketTag::Ack,
            b'B' => PacketTag::Abort,
            b'C' => PacketTag::Change,
            b'D' => PacketTag::Data,
            b'E' => PacketTag::Exit,
            b'I' => PacketTag::Init,
            b'N' => PacketTag::Nak,
            b'P' => PacketTag::Preq,
            other => return Err(UnknownTag(other)),
        })
    }
}

impl From<PacketTag> for u8 {
    #[inline]
    fn from(tag: PacketTag) -> u8 {
        tag as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_tag() {
        for &b in b"ABCDEINP" {
            let tag = PacketTag::try_from(b).expect("known tag");
            assert_eq!(u8::from(tag), b);
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        let err = PacketTag::try_from(b'Z').unwrap_err();
        assert_eq!(err.0, b'Z');
    }
}
