//! Noise crypto engine for hushcat.
//!
//! Implements [`hushcat_core::CryptoEngine`] with the Noise XX pattern over
//! X25519, ChaChaPoly and BLAKE2s, encoded as newline-safe text lines.
//!
//! - [`StaticKeypair`]: long-term identity and its key file
//! - [`NoiseEngine`]: query, handshake, transport and end messages
//! - [`WireMessage`]: line encoding of those messages
//!
//! # Security
//!
//! Deniability:
//! - XX authenticates both parties by Diffie-Hellman only; neither side signs
//!   anything a third party could verify
//!
//! Authenticity:
//! - Every data and end message is ChaChaPoly-authenticated under keys only
//!   the two handshake parties hold
//! - A failed authentication tag is an engine error, never silently skipped
//!
//! Identity:
//! - A peer is identified by the SHA-256 fingerprint of its static key

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod keys;
pub mod noise;
pub mod wire;

pub use keys::{KEY_LEN, KeyError, StaticKeypair, create_private_dir, fingerprint_of};
pub use noise::{MAX_PLAINTEXT_CHUNK, NOISE_PATTERN, NoiseEngine, NoiseError};
pub use wire::{Inbound, NONCE_LEN, WireMessage};
