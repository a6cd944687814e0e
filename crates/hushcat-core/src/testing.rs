//! Deterministic crypto engine double.
//!
//! [`TagEngine`] "encrypts" by tagging hex-encoded plaintext, so a test can
//! script every line a peer would send and read back every line the session
//! transmits. It never touches randomness or real keys.
//!
//! # Wire lines
//!
//! | Line | Meaning |
//! |---|---|
//! | `TAG? <fp>` | hello carrying the sender's fingerprint; marks the channel encrypted |
//! | `TAG:msg <hex>` | encrypted plaintext |
//! | `TAG:plain <hex>` | plaintext that did not come through the encrypted channel |
//! | `TAG:rekey <fp>` | peer now claims a different fingerprint |
//! | `TAG:ping <n>` | asks the receiver to transmit `TAG:pong <n>` |
//! | `TAG:pong <n>` | reply to a ping; no effect |
//! | `TAG:end` | peer ended the conversation |

use bytes::Bytes;
use hushcat_proto::Frame;

use crate::{
    contacts::Fingerprint,
    engine::{CryptoEngine, EngineError, Received, SessionSignal},
};

/// Tagging engine for state machine tests.
#[derive(Debug, Clone)]
pub struct TagEngine {
    me: Fingerprint,
    peer: Option<Fingerprint>,
    ended: bool,
}

/// Frame for a tag line.
///
/// # Panics
///
/// Panics if `text` contains the delimiter. Every tag line is hex or decimal
/// after the tag, so this only fires on a broken test.
#[allow(clippy::expect_used)]
fn line(text: &str) -> Frame {
    Frame::from_text(text).expect("tag lines never contain a newline")
}

impl TagEngine {
    /// Engine for a local identity with fingerprint `me`.
    pub fn new(me: Fingerprint) -> Self {
        Self { me, peer: None, ended: false }
    }

    /// Hello line announcing `fingerprint`.
    pub fn hello(fingerprint: &Fingerprint) -> Frame {
        line(&format!("TAG? {fingerprint}"))
    }

    /// Encrypted message line.
    pub fn msg(plaintext: &[u8]) -> Frame {
        line(&format!("TAG:msg {}", hex::encode(plaintext)))
    }

    /// Unencrypted message line.
    pub fn plain(plaintext: &[u8]) -> Frame {
        line(&format!("TAG:plain {}", hex::encode(plaintext)))
    }

    /// Identity change line.
    pub fn rekey(fingerprint: &Fingerprint) -> Frame {
        line(&format!("TAG:rekey {fingerprint}"))
    }

    /// Ping line.
    pub fn ping(n: u32) -> Frame {
        line(&format!("TAG:ping {n}"))
    }

    /// Pong line.
    pub fn pong(n: u32) -> Frame {
        line(&format!("TAG:pong {n}"))
    }

    /// End line.
    pub fn end_frame() -> Frame {
        line("TAG:end")
    }

    /// Recover the plaintext of a `TAG:msg` line, if `frame` is one.
    pub fn decode_msg(frame: &Frame) -> Option<Vec<u8>> {
        let body = frame.as_text()?.strip_prefix("TAG:msg ")?;
        hex::decode(body).ok()
    }

    fn parse_fingerprint(text: &str) -> Result<Fingerprint, EngineError> {
        Fingerprint::from_hex(text).map_err(|e| EngineError::Malformed(e.to_string()))
    }

    fn parse_hex(text: &str) -> Result<Bytes, EngineError> {
        hex::decode(text).map(Bytes::from).map_err(|e| EngineError::Malformed(e.to_string()))
    }
}

impl CryptoEngine for TagEngine {
    fn initiate(&mut self) -> Result<Vec<Frame>, EngineError> {
        Ok(vec![Self::hello(&self.me)])
    }

    fn send(&mut self, plaintext: &[u8]) -> Result<Vec<Frame>, EngineError> {
        if self.ended {
            return Err(EngineError::Ended);
        }
        if self.peer.is_none() {
            return Err(EngineError::NotEncrypted);
        }
        Ok(vec![Self::msg(plaintext)])
    }

    fn receive(&mut self, frame: &Frame) -> Result<Received, EngineError> {
        let text =
            frame.as_text().ok_or_else(|| EngineError::Malformed("not utf-8".to_string()))?;
        let (tag, body) = text.split_once(' ').unwrap_or((text, ""));

        match tag {
            "TAG?" => {
                self.peer = Some(Self::parse_fingerprint(body)?);
                Ok(Received::empty(true))
            },
            "TAG:msg" => Ok(Received {
                plaintext: Self::parse_hex(body)?,
                encrypted: self.is_encrypted(),
                signal: SessionSignal::Active,
                to_send: Vec::new(),
            }),
            "TAG:plain" => Ok(Received {
                plaintext: Self::parse_hex(body)?,
                encrypted: false,
                signal: SessionSignal::Active,
                to_send: Vec::new(),
            }),
            "TAG:rekey" => {
                self.peer = Some(Self::parse_fingerprint(body)?);
                Ok(Received::empty(true))
            },
            "TAG:ping" => {
                let n: u32 = body.parse().map_err(|_| EngineError::Malformed(text.to_string()))?;
                let mut received = Received::empty(self.is_encrypted());
                received.to_send.push(Self::pong(n));
                Ok(received)
            },
            "TAG:pong" => Ok(Received::empty(self.is_encrypted())),
            "TAG:end" => {
                self.ended = true;
                let mut received = Received::empty(false);
                received.signal = SessionSignal::Ended;
                Ok(received)
            },
            _ => Err(EngineError::Malformed(text.to_string())),
        }
    }

    fn end(&mut self) -> Vec<Frame> {
        if self.ended || self.peer.is_none() {
            return Vec::new();
        }
        self.ended = true;
        vec![Self::end_frame()]
    }

    fn is_encrypted(&self) -> bool {
        self.peer.is_some() && !self.ended
    }

    fn peer_fingerprint(&self) -> Option<Fingerprint> {
        self.peer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_marks_encrypted() {
        let peer = Fingerprint::new(vec![0xbb, 0x22]);
        let mut engine = TagEngine::new(Fingerprint::new(vec![0xaa, 0x11]));

        assert!(!engine.is_encrypted());
        assert_eq!(engine.send(b"hi"), Err(EngineError::NotEncrypted));

        engine.receive(&TagEngine::hello(&peer)).unwrap();
        assert!(engine.is_encrypted());
        assert_eq!(engine.peer_fingerprint(), Some(peer));

        let frames = engine.send(b"hi").unwrap();
        assert_eq!(TagEngine::decode_msg(&frames[0]), Some(b"hi".to_vec()));
    }

    #[test]
    fn ping_is_answered() {
        let mut engine = TagEngine::new(Fingerprint::new(vec![1]));
        let received = engine.receive(&TagEngine::ping(7)).unwrap();
        assert_eq!(received.to_send, vec![TagEngine::pong(7)]);
    }

    #[test]
    fn unknown_line_is_malformed() {
        let mut engine = TagEngine::new(Fingerprint::new(vec![1]));
        assert!(matches!(
            engine.receive(&line("hello")),
            Err(EngineError::Malformed(_))
        ));
    }
}
