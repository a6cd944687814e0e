//! Core conversation logic for hushcat.
//!
//! Pure state machines with no I/O, following the action pattern: the
//! conversation [`Session`] consumes events (an inbound frame, a chunk of local
//! plaintext, end-of-stream) and returns [`SessionAction`]s for a driver to
//! execute. The async orchestrator in `hushcat-app` is one such driver; tests
//! are another.
//!
//! # Components
//!
//! - [`ContactBook`]: bidirectional name/fingerprint registry
//! - [`FileContactStore`]: line-oriented contact file with atomic saves
//! - [`AuthMode`] / [`policy::decide`]: authorization policy over peer
//!   identities
//! - [`CryptoEngine`]: capability surface of the external encryption engine
//! - [`Session`]: handshake, authorization and forwarding state machine
//!
//! # Security Invariants
//!
//! - No plaintext is delivered unless the channel is encrypted AND the peer
//!   passed the authorization policy.
//! - The peer identity recorded at authorization never changes for the rest of
//!   the session.
//! - Every inconsistency is fatal. Nothing is silently discarded.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod contacts;
pub mod engine;
pub mod error;
pub mod policy;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use contacts::{
    ContactBook, ContactError, Fingerprint, SELF_NAME,
    store::{ContactStore, ContactStoreError, FileContactStore},
};
pub use engine::{CryptoEngine, EngineError, Received, SessionSignal};
pub use error::{ProtocolViolation, SessionError, TransportError};
pub use policy::{AuthFlags, AuthMode, ConfigConflict, Decision, Rejection};
pub use session::{Session, SessionAction, SessionState};
