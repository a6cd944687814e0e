//! Incremental frame decoder.
//!
//! The transport delivers bytes in whatever chunks the kernel hands us, so a
//! single read may hold half a frame, several frames, or the tail of one frame
//! and the head of the next. [`FrameDecoder`] buffers input and yields a frame
//! each time it sees a delimiter, keeping the remainder for the next call.
//!
//! # Usage
//!
//! ```
//! use hushcat_proto::FrameDecoder;
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.extend(b"?HUSH? AA");
//! assert!(decoder.next_frame().unwrap().is_none());
//!
//! decoder.extend(b"==\n?HUSH:hs");
//! let frame = decoder.next_frame().unwrap().unwrap();
//! assert_eq!(frame.as_text(), Some("?HUSH? AA=="));
//!
//! // The stream ends with an undelimited partial frame
//! assert!(decoder.finish().is_err());
//! ```

use bytes::BytesMut;

use crate::{DELIMITER, Frame, errors::FramingError};

/// Largest frame the decoder will buffer before giving up on the stream.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Incremental, delimiter-scanning frame decoder.
///
/// # Invariants
///
/// - Bytes before `scanned` in the buffer contain no delimiter, so each byte
///   is inspected at most once regardless of how input is chunked.
/// - Frames are yielded in stream order.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    scanned: usize,
    max_frame_len: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a decoder that rejects frames longer than `max_frame_len`.
    #[must_use]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { buffer: BytesMut::new(), scanned: 0, max_frame_len }
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as a frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Yield the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` when more input is needed.
    ///
    /// # Errors
    ///
    /// - `FramingError::FrameTooLarge` if the next frame is longer than the
    ///   frame limit, whether or not its delimiter has arrived yet
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FramingError> {
        let unscanned = &self.buffer[self.scanned..];

        match unscanned.iter().position(|&b| b == DELIMITER) {
            Some(pos) => {
                let end = self.scanned + pos;
                if end > self.max_frame_len {
                    return Err(FramingError::FrameTooLarge { size: end, max: self.max_frame_len });
                }

                let mut line = self.buffer.split_to(end + 1);
                line.truncate(end);
                self.scanned = 0;

                Ok(Some(Frame::from_decoded(line.freeze())))
            },
            None => {
                self.scanned = self.buffer.len();

                if self.buffer.len() > self.max_frame_len {
                    return Err(FramingError::FrameTooLarge {
                        size: self.buffer.len(),
                        max: self.max_frame_len,
                    });
                }

                Ok(None)
            },
        }
    }

    /// Signal permanent end-of-stream.
    ///
    /// Call after draining [`FrameDecoder::next_frame`].
    ///
    /// # Errors
    ///
    /// - `FramingError::Truncated` if a partial frame is still buffered. The
    ///   partial bytes are discarded, never surfaced as a frame.
    pub fn finish(self) -> Result<(), FramingError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(FramingError::Truncated { residual: self.buffer.len() })
        }
    }

    /// Decode a complete stream held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`FrameDecoder::next_frame`] and [`FrameDecoder::finish`].
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<Frame>, FramingError> {
        let mut decoder = Self::new();
        decoder.extend(bytes);

        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame()? {
            frames.push(frame);
        }

        decoder.finish()?;
        Ok(frames)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_frames_in_order() {
        let frames = FrameDecoder::decode_all(b"one\ntwo\n\nthree\n").unwrap();
        let texts: Vec<_> = frames.iter().filter_map(Frame::as_text).collect();
        assert_eq!(texts, vec!["one", "two", "", "three"]);
    }

    #[test]
    fn retains_remainder_between_calls() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"abc\nde");

        assert_eq!(decoder.next_frame().unwrap().unwrap().as_text(), Some("abc"));
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 2);

        decoder.extend(b"f\n");
        assert_eq!(decoder.next_frame().unwrap().unwrap().as_text(), Some("def"));
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn clean_end_of_stream() {
        let decoder = FrameDecoder::new();
        assert_eq!(decoder.finish(), Ok(()));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let result = FrameDecoder::decode_all(b"complete\npartial");
        assert_eq!(result, Err(FramingError::Truncated { residual: 7 }));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut decoder = FrameDecoder::with_max_frame_len(8);
        decoder.extend(b"0123456789");

        let result = decoder.next_frame();
        assert_eq!(result, Err(FramingError::FrameTooLarge { size: 10, max: 8 }));
    }

    #[test]
    fn oversized_frame_is_rejected_even_when_delimited() {
        let mut decoder = FrameDecoder::with_max_frame_len(8);
        decoder.extend(b"0123456789\n");

        let result = decoder.next_frame();
        assert_eq!(result, Err(FramingError::FrameTooLarge { size: 10, max: 8 }));
    }

    #[test]
    fn frame_at_limit_is_accepted() {
        let mut decoder = FrameDecoder::with_max_frame_len(8);
        decoder.extend(b"01234567");
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.extend(b"\n");
        assert_eq!(decoder.next_frame().unwrap().unwrap().len(), 8);
    }
}
