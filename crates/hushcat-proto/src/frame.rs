//! Frame type.
//!
//! A `Frame` is the unit of wire transmission: an opaque payload followed by a
//! single [`DELIMITER`] byte on the wire.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Byte terminating every frame on the wire.
pub const DELIMITER: u8 = b'\n';

/// One protocol message.
///
/// # Invariants
///
/// - The payload never contains [`DELIMITER`]. Enforced by [`Frame::new`] and
///   by the decoder, which splits on the delimiter.
/// - Encode/decode is a byte-exact round trip.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Create a frame, rejecting payloads that contain the delimiter.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::DelimiterInPayload` if the payload contains
    ///   [`DELIMITER`]
    pub fn new(payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();

        if let Some(offset) = payload.iter().position(|&b| b == DELIMITER) {
            return Err(ProtocolError::DelimiterInPayload { offset });
        }

        Ok(Self { payload })
    }

    /// Create a frame from text.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::DelimiterInPayload` if the text contains a newline
    pub fn from_text(text: &str) -> Result<Self> {
        Self::new(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Wrap bytes the decoder already split on the delimiter.
    pub(crate) fn from_decoded(payload: Bytes) -> Self {
        debug_assert!(!payload.contains(&DELIMITER));
        Self { payload }
    }

    /// Payload bytes (without delimiter).
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Payload as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Payload length in bytes (without delimiter).
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty. An empty frame is a bare delimiter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Length of the frame on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.payload.len() + 1
    }

    /// Write `[payload] [DELIMITER]` into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.payload);
        dst.put_u8(DELIMITER);
    }

    /// Encode into a fresh buffer, ready to write to the transport.
    #[must_use]
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.debug_tuple("Frame").field(&text).finish(),
            None => f.debug_tuple("Frame").field(&self.payload).finish(),
        }
    }
}
