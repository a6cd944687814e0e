//! Error types for frame construction and stream decoding.

use thiserror::Error;

/// Errors constructing a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload contains the frame delimiter and cannot be sent as one frame
    #[error("payload contains the frame delimiter at offset {offset}")]
    DelimiterInPayload {
        /// Offset of the first delimiter byte
        offset: usize,
    },
}

/// Errors decoding a byte stream into frames.
///
/// Both variants are fatal for the stream: the decoder cannot resynchronize
/// and nothing it buffered may be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Stream ended with a partial, undelimited frame in the buffer
    #[error("stream closed mid-message ({residual} bytes without a delimiter)")]
    Truncated {
        /// Bytes left in the buffer at end-of-stream
        residual: usize,
    },

    /// Peer sent a frame longer than the frame limit
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Frame bytes seen so far
        size: usize,
        /// Configured limit
        max: usize,
    },
}

/// Result type for frame construction.
pub type Result<T> = std::result::Result<T, ProtocolError>;
