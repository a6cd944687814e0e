//! Text encoding of Noise messages.
//!
//! Every message is one line: a tag, a space, and standard base64. Lines that
//! do not start with [`TAG_PREFIX`] are not engine messages at all; the engine
//! surfaces them as unencrypted text so the session can reject them.
//!
//! ```text
//! ?HUSH? <nonce>       query: opens the handshake, picks roles
//! ?HUSH:hs <message>   Noise handshake message
//! ?HUSH:msg <message>  Noise transport message carrying plaintext
//! ?HUSH:end <message>  Noise transport message ending the conversation
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hushcat_core::EngineError;
use hushcat_proto::Frame;

/// Common prefix of every engine line.
pub const TAG_PREFIX: &str = "?HUSH";

/// Length of the role-selection nonce in a query.
pub const NONCE_LEN: usize = 16;

const QUERY: &str = "?HUSH?";
const HANDSHAKE: &str = "?HUSH:hs";
const DATA: &str = "?HUSH:msg";
const END: &str = "?HUSH:end";

/// One engine line, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Handshake opener with the sender's role-selection nonce
    Query([u8; NONCE_LEN]),
    /// Noise handshake message
    Handshake(Vec<u8>),
    /// Noise transport message carrying plaintext
    Data(Vec<u8>),
    /// Noise transport message ending the conversation
    End(Vec<u8>),
}

/// Classification of an inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// An engine message
    Message(WireMessage),
    /// Anything else, passed through untouched
    Text(&'a [u8]),
}

impl WireMessage {
    /// Classify and decode an inbound frame.
    ///
    /// # Errors
    ///
    /// - `EngineError::Malformed` for a line with the engine prefix that is not
    ///   a well-formed message
    pub fn parse(frame: &Frame) -> Result<Inbound<'_>, EngineError> {
        let payload = frame.payload();
        if !payload.starts_with(TAG_PREFIX.as_bytes()) {
            return Ok(Inbound::Text(payload));
        }

        let text = frame
            .as_text()
            .ok_or_else(|| EngineError::Malformed("engine line is not utf-8".to_string()))?;
        let (tag, body) = text
            .split_once(' ')
            .ok_or_else(|| EngineError::Malformed(format!("missing body in '{text}'")))?;
        let bytes = BASE64
            .decode(body)
            .map_err(|e| EngineError::Malformed(format!("bad base64 in {tag}: {e}")))?;

        let message = match tag {
            QUERY => {
                let nonce = bytes
                    .try_into()
                    .map_err(|_| EngineError::Malformed("query nonce has wrong length".to_string()))?;
                Self::Query(nonce)
            },
            HANDSHAKE => Self::Handshake(bytes),
            DATA => Self::Data(bytes),
            END => Self::End(bytes),
            other => return Err(EngineError::Malformed(format!("unknown message '{other}'"))),
        };

        Ok(Inbound::Message(message))
    }

    /// Encode as a frame.
    ///
    /// # Errors
    ///
    /// Never fails in practice: base64 output holds no delimiter.
    pub fn to_frame(&self) -> Result<Frame, EngineError> {
        let (tag, bytes): (&str, &[u8]) = match self {
            Self::Query(nonce) => (QUERY, nonce),
            Self::Handshake(bytes) => (HANDSHAKE, bytes),
            Self::Data(bytes) => (DATA, bytes),
            Self::End(bytes) => (END, bytes),
        };

        Frame::from_text(&format!("{tag} {}", BASE64.encode(bytes)))
            .map_err(|e| EngineError::Malformed(e.to_string()))
    }
}
