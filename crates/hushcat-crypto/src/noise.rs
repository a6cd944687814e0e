//! Noise XX crypto engine.
//!
//! Both sides open with a query carrying a random nonce. The side with the
//! lower nonce becomes the Noise initiator, so either end of a connection can
//! start talking first. XX then authenticates both static keys with
//! Diffie-Hellman alone: nothing is signed, so a transcript does not prove
//! who wrote it.
//!
//! ```text
//!   A (nonce 03..)                         B (nonce 9f..)
//!     ── query ──────────────────────────────>
//!     <────────────────────────────── query ──
//!     ── hs: -> e ───────────────────────────>
//!     <─────────── hs: <- e, ee, s, es ───────
//!     ── hs: -> s, se ───────────────────────>   A encrypted
//!                                                B encrypted
//! ```
//!
//! # Security
//!
//! - Any handshake or decryption error is terminal for the engine
//! - The end message is a transport message, so a forged end fails to decrypt
//! - No fallback patterns, no negotiation

use hushcat_core::{CryptoEngine, EngineError, Fingerprint, Received, SessionSignal};
use hushcat_proto::Frame;
use snow::{Builder, HandshakeState, TransportState, params::NoiseParams};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    keys::{StaticKeypair, fingerprint_of},
    wire::{Inbound, NONCE_LEN, WireMessage},
};

/// Noise protocol name.
pub const NOISE_PATTERN: &str = "Noise_XX_25519_ChaChaPoly_BLAKE2s";

/// Largest Noise message.
pub const MAX_MESSAGE_LEN: usize = 65535;

/// ChaChaPoly authentication tag length.
const TAG_LEN: usize = 16;

/// Largest plaintext carried by one data message.
pub const MAX_PLAINTEXT_CHUNK: usize = MAX_MESSAGE_LEN - TAG_LEN;

/// Errors constructing an engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoiseError {
    /// OS randomness unavailable
    #[error("random number generator failed: {0}")]
    Random(String),
}

enum Phase {
    Idle,
    AwaitingQuery,
    Handshake(Box<HandshakeState>),
    Transport { transport: Box<TransportState>, peer: Fingerprint },
    Ended,
}

/// [`CryptoEngine`] speaking Noise XX over text lines.
pub struct NoiseEngine {
    keypair: StaticKeypair,
    nonce: [u8; NONCE_LEN],
    phase: Phase,
}

impl NoiseEngine {
    /// Engine for `keypair` with a random role-selection nonce.
    pub fn new(keypair: StaticKeypair) -> Result<Self, NoiseError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|e| NoiseError::Random(e.to_string()))?;
        Ok(Self::with_nonce(keypair, nonce))
    }

    /// Engine with a caller-chosen nonce.
    #[must_use]
    pub fn with_nonce(keypair: StaticKeypair, nonce: [u8; NONCE_LEN]) -> Self {
        Self { keypair, nonce, phase: Phase::Idle }
    }

    /// Whether the handshake finished and the conversation has not ended.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self.phase, Phase::Transport { .. })
    }

    fn params() -> Result<NoiseParams, EngineError> {
        NOISE_PATTERN.parse().map_err(|e: snow::Error| EngineError::Handshake(e.to_string()))
    }

    fn start_handshake(&mut self, peer_nonce: [u8; NONCE_LEN]) -> Result<Vec<Frame>, EngineError> {
        if peer_nonce == self.nonce {
            return Err(EngineError::Handshake("peer query reflects our own nonce".to_string()));
        }

        let builder = Builder::new(Self::params()?).local_private_key(self.keypair.secret_key());
        let initiator = self.nonce < peer_nonce;
        let state = if initiator { builder.build_initiator() } else { builder.build_responder() }
            .map_err(|e| EngineError::Handshake(e.to_string()))?;

        debug!(initiator, "starting noise handshake");
        self.phase = Phase::Handshake(Box::new(state));

        if initiator { self.write_handshake() } else { Ok(Vec::new()) }
    }

    fn write_handshake(&mut self) -> Result<Vec<Frame>, EngineError> {
        let Phase::Handshake(state) = &mut self.phase else {
            return Err(EngineError::Handshake("not handshaking".to_string()));
        };

        let mut buf = vec![0u8; MAX_MESSAGE_LEN];
        let len = state
            .write_message(&[], &mut buf)
            .map_err(|e| EngineError::Handshake(e.to_string()))?;
        buf.truncate(len);

        let frame = WireMessage::Handshake(buf).to_frame()?;
        self.finish_handshake()?;
        Ok(vec![frame])
    }

    fn read_handshake(&mut self, message: &[u8]) -> Result<Vec<Frame>, EngineError> {
        let Phase::Handshake(state) = &mut self.phase else {
            return Err(EngineError::Handshake("handshake message out of order".to_string()));
        };
        if state.is_my_turn() {
            return Err(EngineError::Handshake("handshake message out of turn".to_string()));
        }

        let mut payload = vec![0u8; MAX_MESSAGE_LEN];
        state
            .read_message(message, &mut payload)
            .map_err(|e| EngineError::Handshake(e.to_string()))?;

        let my_turn = state.is_my_turn() && !state.is_handshake_finished();
        if my_turn {
            return self.write_handshake();
        }

        self.finish_handshake()?;
        Ok(Vec::new())
    }

    fn finish_handshake(&mut self) -> Result<(), EngineError> {
        let finished = matches!(&self.phase, Phase::Handshake(state) if state.is_handshake_finished());
        if !finished {
            return Ok(());
        }

        let Phase::Handshake(state) = std::mem::replace(&mut self.phase, Phase::Ended) else {
            return Err(EngineError::Handshake("not handshaking".to_string()));
        };

        let peer = state
            .get_remote_static()
            .map(fingerprint_of)
            .ok_or_else(|| EngineError::Handshake("peer sent no static key".to_string()))?;
        let transport =
            (*state).into_transport_mode().map_err(|e| EngineError::Handshake(e.to_string()))?;

        debug!(%peer, "noise handshake complete");
        self.phase = Phase::Transport { transport: Box::new(transport), peer };
        Ok(())
    }

    fn decrypt(&mut self, message: &[u8]) -> Result<Vec<u8>, EngineError> {
        let Phase::Transport { transport, .. } = &mut self.phase else {
            return Err(EngineError::NotEncrypted);
        };

        let mut plaintext = vec![0u8; MAX_MESSAGE_LEN];
        let len = transport.read_message(message, &mut plaintext).map_err(|_| EngineError::Decrypt)?;
        plaintext.truncate(len);
        Ok(plaintext)
    }

    fn encrypt(transport: &mut TransportState, plaintext: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut message = vec![0u8; plaintext.len() + TAG_LEN];
        let len = transport
            .write_message(plaintext, &mut message)
            .map_err(|e| EngineError::Handshake(e.to_string()))?;
        message.truncate(len);
        Ok(message)
    }

    fn received(&self, plaintext: Vec<u8>, to_send: Vec<Frame>) -> Received {
        Received {
            plaintext: plaintext.into(),
            encrypted: self.is_encrypted(),
            signal: SessionSignal::Active,
            to_send,
        }
    }
}

impl CryptoEngine for NoiseEngine {
    fn initiate(&mut self) -> Result<Vec<Frame>, EngineError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(EngineError::Handshake("handshake already started".to_string()));
        }

        self.phase = Phase::AwaitingQuery;
        Ok(vec![WireMessage::Query(self.nonce).to_frame()?])
    }

    fn send(&mut self, plaintext: &[u8]) -> Result<Vec<Frame>, EngineError> {
        let ended = matches!(self.phase, Phase::Ended);
        let Phase::Transport { transport, .. } = &mut self.phase else {
            return Err(if ended { EngineError::Ended } else { EngineError::NotEncrypted });
        };

        plaintext
            .chunks(MAX_PLAINTEXT_CHUNK)
            .map(|chunk| WireMessage::Data(Self::encrypt(transport, chunk)?).to_frame())
            .collect()
    }

    fn receive(&mut self, frame: &Frame) -> Result<Received, EngineError> {
        let message = match WireMessage::parse(frame)? {
            Inbound::Text(text) => {
                return Ok(Received {
                    plaintext: text.to_vec().into(),
                    encrypted: false,
                    signal: SessionSignal::Active,
                    to_send: Vec::new(),
                });
            },
            Inbound::Message(message) => message,
        };

        if matches!(self.phase, Phase::Ended) {
            return Err(EngineError::Ended);
        }

        match message {
            WireMessage::Query(peer_nonce) => {
                if !matches!(self.phase, Phase::AwaitingQuery) {
                    return Err(EngineError::Handshake("unexpected query".to_string()));
                }
                let to_send = self.start_handshake(peer_nonce)?;
                Ok(self.received(Vec::new(), to_send))
            },
            WireMessage::Handshake(bytes) => {
                let to_send = self.read_handshake(&bytes)?;
                Ok(self.received(Vec::new(), to_send))
            },
            WireMessage::Data(bytes) => {
                let plaintext = self.decrypt(&bytes)?;
                Ok(self.received(plaintext, Vec::new()))
            },
            WireMessage::End(bytes) => {
                let payload = self.decrypt(&bytes)?;
                if !payload.is_empty() {
                    return Err(EngineError::Malformed("end message carries data".to_string()));
                }
                self.phase = Phase::Ended;
                let mut received = Received::empty(false);
                received.signal = SessionSignal::Ended;
                Ok(received)
            },
        }
    }

    fn end(&mut self) -> Vec<Frame> {
        let phase = std::mem::replace(&mut self.phase, Phase::Ended);
        let Phase::Transport { mut transport, .. } = phase else {
            return Vec::new();
        };

        match Self::encrypt(&mut transport, &[]).and_then(|message| WireMessage::End(message).to_frame()) {
            Ok(frame) => vec![frame],
            Err(e) => {
                warn!("could not encode end message: {e}");
                Vec::new()
            },
        }
    }

    fn is_encrypted(&self) -> bool {
        self.is_transport()
    }

    fn peer_fingerprint(&self) -> Option<Fingerprint> {
        match &self.phase {
            Phase::Transport { peer, .. } => Some(peer.clone()),
            Phase::Idle | Phase::AwaitingQuery | Phase::Handshake(_) | Phase::Ended => None,
        }
    }
}
