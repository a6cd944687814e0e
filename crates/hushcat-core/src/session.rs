//! Conversation state machine.
//!
//! Drives the handshake, authorization and forwarding rules for one
//! conversation. Uses the action pattern: each event method returns the
//! [`SessionAction`]s the driver must execute, in order. The session performs
//! no I/O.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ start ┌──────────────┐ encrypted + allowed ┌────────────┐
//! │ Init │──────>│ Unauthorized │────────────────────>│ Authorized │
//! └──────┘       └──────────────┘                     └────────────┘
//!                   │        │  local EOF / interrupt        │    │
//!                   │        └────────────────┐  ┌───────────┘    │
//!                   │                         ↓  ↓                │
//!                   │ peer ended         ┌────────┐   peer ended  │
//!                   │                    │ Ending │               │
//!                   │                    └────────┘               │
//!                   │                         │ remote closed     │
//!                   ↓                         ↓                   │
//!              ┌────────────┐<────────────────────────────────────┘
//!              │ Terminated │
//!              └────────────┘
//!
//! Any error moves to Aborted, from every state.
//! ```
//!
//! # Security Invariants
//!
//! - `OpenLocal` is emitted at most once, and only on entering Authorized.
//!   Until then no local plaintext exists for the driver to forward.
//! - `Deliver` is only emitted in Authorized, for plaintext the engine reports
//!   as encrypted.
//! - The fingerprint recorded at authorization is compared against the engine
//!   after every inbound frame.

use bytes::Bytes;
use hushcat_proto::Frame;
use tracing::{debug, info, warn};

use crate::{
    contacts::{ContactBook, ContactError, Fingerprint},
    engine::{CryptoEngine, SessionSignal},
    error::{ProtocolViolation, SessionError, TransportError},
    policy::{self, AuthMode, ConfigConflict, Decision},
};

/// Actions returned by the session for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Queue this frame on the remote-outbound queue
    Transmit(Frame),

    /// Queue this plaintext on the local-outbound queue
    Deliver(Bytes),

    /// Start the local plaintext pumps (stdio or the bridged process)
    OpenLocal {
        /// Contact name the peer was authorized as, if any
        peer_name: Option<String>,
    },

    /// Flush [`Session::contacts`] to the contact store
    PersistContacts,

    /// Queue the stop sentinel on the remote-outbound queue, then wait for
    /// the remote side to close
    Drain,

    /// Peer ended the conversation; stop without waiting
    Finish,
}

/// Conversation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, handshake not started
    Init,
    /// Handshake in progress or peer not yet authorized
    Unauthorized,
    /// Peer authorized; plaintext flows both ways
    Authorized,
    /// Termination frames queued; waiting for the remote side to close
    Ending,
    /// Conversation over without error
    Terminated,
    /// Conversation over after a fatal error
    Aborted,
}

/// One conversation with one peer.
pub struct Session<E> {
    engine: E,
    contacts: ContactBook,
    mode: AuthMode,
    state: SessionState,
    peer: Option<Fingerprint>,
    peer_name: Option<String>,
    failure: Option<ProtocolViolation>,
}

impl<E: CryptoEngine> Session<E> {
    /// Create a session in [`SessionState::Init`].
    ///
    /// `mode` must already be validated against `contacts` with
    /// [`AuthMode::resolve`].
    pub fn new(engine: E, contacts: ContactBook, mode: AuthMode) -> Self {
        Self {
            engine,
            contacts,
            mode,
            state: SessionState::Init,
            peer: None,
            peer_name: None,
            failure: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Contact book, including any contact remembered during this session.
    #[must_use]
    pub fn contacts(&self) -> &ContactBook {
        &self.contacts
    }

    /// Fingerprint recorded at authorization. `None` before Authorized.
    #[must_use]
    pub fn peer_fingerprint(&self) -> Option<&Fingerprint> {
        self.peer.as_ref()
    }

    /// Contact name the peer was authorized as, if any.
    #[must_use]
    pub fn peer_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    /// Whether the engine reports an encrypted channel.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.engine.is_encrypted()
    }

    /// Whether the session reached Terminated or Aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Terminated | SessionState::Aborted)
    }

    /// Queue the handshake initiation.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not in Init
    /// - `SessionError::Protocol` if the engine cannot initiate
    pub fn start(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.require(&[SessionState::Init], "start")?;

        let result = self
            .engine
            .initiate()
            .map(|frames| frames.into_iter().map(SessionAction::Transmit).collect())
            .map_err(|e| SessionError::from(ProtocolViolation::Engine(e)));
        let actions = self.abort_on_error(result)?;

        self.transition(SessionState::Unauthorized);
        Ok(actions)
    }

    /// Process one frame from the remote-inbound queue.
    ///
    /// Frames arriving while Ending are discarded: only closure of the remote
    /// side matters then.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not Unauthorized, Authorized or Ending
    /// - `SessionError::Protocol` for engine failures, plaintext outside
    ///   Authorized, or an identity change
    /// - `SessionError::Rejected` if the policy denies the peer
    pub fn handle_frame(&mut self, frame: &Frame) -> Result<Vec<SessionAction>, SessionError> {
        if self.state == SessionState::Ending {
            debug!(len = frame.len(), "discarding frame while ending");
            return Ok(Vec::new());
        }
        self.require(&[SessionState::Unauthorized, SessionState::Authorized], "handle_frame")?;

        let result = self.receive(frame);
        self.abort_on_error(result)
    }

    /// Process one chunk from the local-inbound queue.
    ///
    /// A chunk containing a NUL byte is not sent. The session begins a
    /// graceful ending instead and fails with
    /// [`ProtocolViolation::BinaryPayload`] once the remote side closes.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not Authorized
    /// - `SessionError::Protocol` if the engine cannot encrypt
    pub fn handle_plaintext(&mut self, plaintext: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        self.require(&[SessionState::Authorized], "handle_plaintext")?;

        if plaintext.contains(&0) {
            warn!("refusing binary data on a text channel");
            self.failure = Some(ProtocolViolation::BinaryPayload);
            return self.begin_ending();
        }

        let result = self
            .engine
            .send(plaintext)
            .map(|frames| frames.into_iter().map(SessionAction::Transmit).collect())
            .map_err(|e| SessionError::from(ProtocolViolation::Engine(e)));
        self.abort_on_error(result)
    }

    /// End the conversation from this side (local end-of-stream or interrupt).
    ///
    /// Queues the engine's termination frames followed by [`SessionAction::Drain`].
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not Unauthorized or Authorized
    pub fn begin_ending(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.require(&[SessionState::Unauthorized, SessionState::Authorized], "begin_ending")?;

        let mut actions: Vec<_> =
            self.engine.end().into_iter().map(SessionAction::Transmit).collect();
        actions.push(SessionAction::Drain);

        self.transition(SessionState::Ending);
        Ok(actions)
    }

    /// The remote-inbound queue reported closure.
    ///
    /// # Errors
    ///
    /// - `SessionError::Transport` with `ConnectionDropped` if not Ending
    /// - `SessionError::Protocol` if the ending was caused by a violation
    /// - `SessionError::InvalidState` if the session already finished
    pub fn handle_remote_closed(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ending => match self.failure.take() {
                Some(violation) => self.abort_on_error(Err(violation.into())),
                None => {
                    self.transition(SessionState::Terminated);
                    Ok(())
                },
            },
            SessionState::Unauthorized | SessionState::Authorized => {
                let authorized = self.state == SessionState::Authorized;
                self.abort_on_error(Err(TransportError::ConnectionDropped { authorized }.into()))
            },
            SessionState::Init | SessionState::Terminated | SessionState::Aborted => {
                Err(self.invalid_state("handle_remote_closed"))
            },
        }
    }

    /// Record a fatal error raised outside the session (transport, framing).
    pub fn abort(&mut self) {
        self.transition(SessionState::Aborted);
    }

    fn receive(&mut self, frame: &Frame) -> Result<Vec<SessionAction>, SessionError> {
        let received = self.engine.receive(frame).map_err(ProtocolViolation::Engine)?;

        if received.signal == SessionSignal::Ended {
            info!("the peer ended the conversation");
            self.transition(SessionState::Terminated);
            return Ok(vec![SessionAction::Finish]);
        }

        let mut actions: Vec<_> =
            received.to_send.into_iter().map(SessionAction::Transmit).collect();

        if self.engine.is_encrypted() {
            let fingerprint =
                self.engine.peer_fingerprint().ok_or(ProtocolViolation::MissingFingerprint)?;

            match &self.peer {
                Some(expected) if *expected != fingerprint => {
                    return Err(ProtocolViolation::ContactChanged {
                        expected: expected.clone(),
                        actual: fingerprint,
                    }
                    .into());
                },
                Some(_) => {},
                None => self.authorize(fingerprint, &mut actions)?,
            }
        }

        if !received.plaintext.is_empty() {
            if !received.encrypted || self.state != SessionState::Authorized {
                return Err(ProtocolViolation::UnexpectedPlaintext.into());
            }
            actions.push(SessionAction::Deliver(received.plaintext));
        }

        Ok(actions)
    }

    fn authorize(
        &mut self,
        fingerprint: Fingerprint,
        actions: &mut Vec<SessionAction>,
    ) -> Result<(), SessionError> {
        let decision = policy::decide(&fingerprint, &self.contacts, &self.mode);
        debug!(%fingerprint, ?decision, "authorization decision");

        match &decision {
            Decision::Reject(rejection) => return Err(rejection.clone().into()),
            Decision::Allow { known_as: Some(name) } => info!("the contact is '{name}'"),
            Decision::Allow { known_as: None } => info!("the contact is unknown ({fingerprint})"),
            Decision::AllowAndRemember { name } => {
                info!("remembering contact '{name}'");
                self.contacts.insert(name, fingerprint.clone()).map_err(|e| match e {
                    ContactError::InvalidName(name) => ConfigConflict::InvalidName(name),
                    ContactError::DuplicateName(_) | ContactError::DuplicateFingerprint { .. } => {
                        ConfigConflict::RememberKnown(name.clone())
                    },
                })?;
                actions.push(SessionAction::PersistContacts);
            },
            Decision::AllowAlreadyKnown { known_as, .. } => {
                warn!("expected an unknown contact, but the contact is known as '{known_as}'");
            },
        }

        self.peer = Some(fingerprint);
        self.peer_name = decision.peer_name().map(str::to_string);
        self.transition(SessionState::Authorized);
        actions.push(SessionAction::OpenLocal { peer_name: self.peer_name.clone() });

        Ok(())
    }

    fn require(&self, allowed: &[SessionState], operation: &'static str) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState { state: self.state, operation }
    }

    fn abort_on_error<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if result.is_err() {
            self.transition(SessionState::Aborted);
        }
        result
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "session state");
            self.state = next;
        }
    }
}
