// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Packet codec (§4.A): prepend/strip the tag byte, wrap/unwrap the
//! compression envelope.
//!
//! A naive compression contract would let the decompressed buffer alias
//! the input, which is a sharp edge to mis-handle (see Design Notes §9,
//! "Compression aliasing"). This closes that hazard: a [`CompressionCodec`]
//! always hands back a freshly owned [`Bytes`], so callers never need to
//! reason about aliasing or double-release.

use bytes::{Bytes, BytesMut};

use crate::{error::DecodeError, protocol::tag::PacketTag};

/// The external compression collaborator. A production deployment plugs in
/// a real codec (e.g. wrapping `flate2`); [`IdentityCodec`] is the
/// pass-through default used for transports that already compress (TLS) or
/// in tests.
pub trait CompressionCodec: Send + Sync {
    /// Compress `input`, returning an owned buffer.
    fn compress(&self, input: &[u8]) -> anyhow::Result<Bytes>;
    /// Decompress `input`, returning an owned buffer.
    fn decompress(&self, input: &[u8]) -> anyhow::Result<Bytes>;
}

/// A no-op codec: `compress`/`decompress` both copy the input verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl CompressionCodec for IdentityCodec {
    fn compress(&self, input: &[u8]) -> anyhow::Result<Bytes> {
        Ok(Bytes::copy_from_slice(input))
    }

    fn decompress(&self, input: &[u8]) -> anyhow::Result<Bytes> {
        Ok(Bytes::copy_from_slice(input))
    }
}

/// Prepend `tag` to `payload`, then pass the combined buffer through the
/// compression envelope.
pub fn frame(
    codec: &dyn CompressionCodec,
    tag: PacketTag,
    payload: &[u8],
) -> anyhow::Result<Bytes> {
    let mut buf = BytesMut::with_capacity(payload.len() + 1);
    buf.extend_from_slice(&[u8::from(tag)]);
    buf.extend_from_slice(payload);
    codec.compress(&buf)
}

/// Reverse the compression envelope, then split the first byte off as the
/// tag.
pub fn unframe(
    codec: &dyn CompressionCodec,
    wire: &[u8],
) -> Result<(PacketTag, Bytes), DecodeError> {
    let plain = codec
        .decompress(wire)
        .map_err(|_| DecodeError::Empty)?;
    if plain.is_empty() {
        return Err(DecodeError::Empty);
    }
    let tag =
        PacketTag::try_from(plain[0]).map_err(|e| DecodeError::UnknownTag(e.0))?;
    let payload = plain.slice(1..);
    Ok((tag, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_unframe_round_trips_for_every_tag() {
        let codec = IdentityCodec;
        for &b in b"ABCDEINP" {
            let tag = PacketTag::try_from(b).expect("known tag");
            let payload = b"hello, world";
            let wire = frame(&codec, tag, payload).expect("frame");
            let (got_tag, got_payload) = unframe(&codec, &wire).expect("unframe");
            assert_eq!(got_tag, tag);
            assert_eq!(&got_payload[..], payload);
        }
    }

    #[test]
    fn empty_payload_is_a_valid_frame() {
        let codec = IdentityCodec;
        let wire = frame(&codec, PacketTag::Data, &[]).expect("frame");
        let (tag, payload) = unframe(&codec, &wire).expect("unframe");
        assert_eq!(tag, PacketTag::Data);
        assert!(payload.is_empty());
    }

    #[test]
    fn unframe_rejects_empty_wire_buffer() {
        let codec = IdentityCodec;
        let err = unframe(&codec, &[]).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn unframe_rejects_unknown_tag() {
        let codec = IdentityCodec;
        let err = unframe(&codec, b"Zpayload").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTag(b'Z')));
    }
}
