//! Error types for a hushcat conversation.
//!
//! Every variant of [`SessionError`] is session-fatal. There is no retry and no
//! partial recovery: the driver reports the error and the process exits with a
//! non-zero status. The only non-error terminations are the peer ending the
//! conversation and the local plaintext source reaching end-of-stream.

use std::io;

use hushcat_proto::FramingError;
use thiserror::Error;

use crate::{
    contacts::{Fingerprint, store::ContactStoreError},
    engine::EngineError,
    policy::{ConfigConflict, Rejection},
    session::SessionState,
};

/// Fatal conversation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Malformed or truncated wire stream
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// I/O failure on the transport, the local streams or a bridged process
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Peer or local input broke a security invariant
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Authorization policy denied the peer
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// Inconsistent authorization flags
    #[error("{0}")]
    Config(#[from] ConfigConflict),

    /// Contact store could not be read or written
    #[error("{0}")]
    Contacts(#[from] ContactStoreError),

    /// Driver called an operation the current state does not allow
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the call was made
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Transport-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Remote side closed the transport before the conversation ended
    #[error("{}", dropped_message(.authorized))]
    ConnectionDropped {
        /// Whether plaintext had already been exchanged
        authorized: bool,
    },

    /// Read or write failed
    #[error("{context}: {message}")]
    Io {
        /// Which stream failed
        context: &'static str,
        /// Underlying error message
        message: String,
    },

    /// Local plaintext consumer went away while data was still flowing
    #[error("local output closed")]
    LocalClosed,
}

fn dropped_message(authorized: &bool) -> &'static str {
    if *authorized {
        "connection dropped; recent messages might not be deniable"
    } else {
        "connection dropped"
    }
}

impl TransportError {
    /// Wrap an I/O error with the name of the stream it happened on.
    pub fn io(context: &'static str, err: &io::Error) -> Self {
        Self::Io { context, message: err.to_string() }
    }
}

/// Security invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Plaintext surfaced while unencrypted or before authorization
    #[error("received unencrypted or unauthenticated text")]
    UnexpectedPlaintext,

    /// Local input contained a NUL byte
    #[error(
        "binary data on a text channel; use base64 or another text-safe encoding for binary data"
    )]
    BinaryPayload,

    /// Peer identity differs from the one authorized at session start
    #[error("the contact changed mid-conversation (expected {expected}, got {actual})")]
    ContactChanged {
        /// Fingerprint recorded at authorization
        expected: Fingerprint,
        /// Fingerprint reported by the engine for the latest frame
        actual: Fingerprint,
    },

    /// Engine claims encryption but cannot name the peer
    #[error("encrypted channel has no peer fingerprint")]
    MissingFingerprint,

    /// Engine rejected a frame or could not encrypt
    #[error("{0}")]
    Engine(#[from] EngineError),
}

/// Convert `SessionError` to `io::Error` at I/O API boundaries.
impl From<SessionError> for io::Error {
    fn from(err: SessionError) -> Self {
        let kind = match &err {
            SessionError::Transport(TransportError::ConnectionDropped { .. }) => {
                io::ErrorKind::ConnectionAborted
            },
            SessionError::Transport(_) | SessionError::Contacts(_) => io::ErrorKind::Other,
            SessionError::Framing(_)
            | SessionError::Protocol(_)
            | SessionError::Rejected(_)
            | SessionError::Config(_)
            | SessionError::InvalidState { .. } => io::ErrorKind::InvalidData,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_connection_mentions_deniability_once_authorized() {
        let before = TransportError::ConnectionDropped { authorized: false };
        let after = TransportError::ConnectionDropped { authorized: true };

        assert_eq!(before.to_string(), "connection dropped");
        assert!(after.to_string().contains("might not be deniable"));
    }

    #[test]
    fn framing_errors_read_as_one_line() {
        let err = SessionError::from(FramingError::Truncated { residual: 5 });
        assert_eq!(
            err.to_string(),
            "framing error: stream closed mid-message (5 bytes without a delimiter)"
        );
    }

    #[test]
    fn io_conversion_keeps_message() {
        let err = SessionError::from(ProtocolViolation::UnexpectedPlaintext);
        let io_err = io::Error::from(err);
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(io_err.to_string().contains("unauthenticated"));
    }
}
