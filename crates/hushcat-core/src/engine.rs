//! Crypto engine capability surface.
//!
//! The session never encrypts anything itself. It hands frames and plaintext
//! to a [`CryptoEngine`] and acts on what comes back. Implementations live
//! outside this crate: the Noise engine in `hushcat-crypto` for real use, the
//! tag engine in [`crate::testing`] for state machine tests.

use bytes::Bytes;
use hushcat_proto::Frame;
use thiserror::Error;

use crate::contacts::Fingerprint;

/// Conversation state reported by the engine after a receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// Conversation continues
    Active,
    /// Peer ended the conversation
    Ended,
}

/// Result of handing one inbound frame to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Decrypted plaintext, empty if the frame carried none
    pub plaintext: Bytes,
    /// Whether `plaintext` came out of the encrypted channel
    pub encrypted: bool,
    /// Conversation state after this frame
    pub signal: SessionSignal,
    /// Frames to transmit in response, in order
    pub to_send: Vec<Frame>,
}

impl Received {
    /// Nothing to deliver, nothing to send.
    #[must_use]
    pub fn empty(encrypted: bool) -> Self {
        Self { plaintext: Bytes::new(), encrypted, signal: SessionSignal::Active, to_send: Vec::new() }
    }
}

/// Engine failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Frame is not a message this engine understands
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Handshake failed or was attempted out of order
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Ciphertext failed authentication
    #[error("message failed to decrypt")]
    Decrypt,

    /// Send attempted before the channel is encrypted
    #[error("channel is not encrypted")]
    NotEncrypted,

    /// Operation attempted after the conversation ended
    #[error("conversation already ended")]
    Ended,
}

/// External encryption engine.
///
/// Every frame the engine produces must be free of the newline delimiter.
pub trait CryptoEngine: Send {
    /// Frames that open the handshake. Called once at session start.
    fn initiate(&mut self) -> Result<Vec<Frame>, EngineError>;

    /// Encrypt local plaintext into frames to transmit.
    fn send(&mut self, plaintext: &[u8]) -> Result<Vec<Frame>, EngineError>;

    /// Process one inbound frame.
    fn receive(&mut self, frame: &Frame) -> Result<Received, EngineError>;

    /// Frames that end the conversation. Empty if nothing was established.
    fn end(&mut self) -> Vec<Frame>;

    /// Whether the channel is currently encrypted.
    fn is_encrypted(&self) -> bool;

    /// Fingerprint of the peer's long-term key. `None` until encrypted.
    fn peer_fingerprint(&self) -> Option<Fingerprint>;
}
