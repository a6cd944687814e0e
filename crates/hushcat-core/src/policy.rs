//! Authorization policy.
//!
//! [`decide`] is a pure function of the peer fingerprint, the contact book and
//! the configured [`AuthMode`]. It is called exactly once per session, when the
//! channel first becomes encrypted. Applying the decision (remembering a new
//! contact, persisting the book) is the session's job.

use thiserror::Error;

use crate::contacts::{ContactBook, Fingerprint, SELF_NAME};

/// Authorization flags as given on the command line, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthFlags {
    /// Talk to unknown peers
    pub anyone: bool,
    /// Only talk to the contact with this name
    pub expect: Option<String>,
    /// Remember an unknown peer under this name
    pub remember: Option<String>,
}

/// Validated authorization mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// Only known contacts
    #[default]
    KnownOnly,
    /// Any peer
    Anyone,
    /// Only the named, already known contact
    Expect(String),
    /// Any peer, remembering an unknown one under the given name
    Remember(String),
}

/// Inconsistent authorization flags.
///
/// Detected before any network I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigConflict {
    /// `--expect` and `--remember` together
    #[error("--expect and --remember cannot be combined")]
    ExpectWithRemember,

    /// `--expect` and `--anyone` together
    #[error("--expect and --anyone cannot be combined")]
    ExpectWithAnyone,

    /// `--expect` names a contact that is not in the book
    #[error("cannot expect '{0}': no such contact")]
    ExpectUnknown(String),

    /// `--remember` names a contact that is already in the book
    #[error("cannot remember '{0}': a contact with that name already exists")]
    RememberKnown(String),

    /// `--remember` name is reserved or cannot be stored
    #[error("cannot remember '{0}': invalid contact name")]
    InvalidName(String),
}

impl AuthMode {
    /// Validate `flags` against the contacts loaded at startup.
    pub fn resolve(flags: &AuthFlags, contacts: &ContactBook) -> Result<Self, ConfigConflict> {
        match (&flags.expect, &flags.remember) {
            (Some(_), Some(_)) => Err(ConfigConflict::ExpectWithRemember),
            (Some(_), None) if flags.anyone => Err(ConfigConflict::ExpectWithAnyone),
            (Some(name), None) => {
                if contacts.contains_name(name) {
                    Ok(Self::Expect(name.clone()))
                } else {
                    Err(ConfigConflict::ExpectUnknown(name.clone()))
                }
            },
            (None, Some(name)) => {
                if name == SELF_NAME || !ContactBook::is_valid_name(name) {
                    Err(ConfigConflict::InvalidName(name.clone()))
                } else if contacts.contains_name(name) {
                    Err(ConfigConflict::RememberKnown(name.clone()))
                } else {
                    Ok(Self::Remember(name.clone()))
                }
            },
            (None, None) if flags.anyone => Ok(Self::Anyone),
            (None, None) => Ok(Self::KnownOnly),
        }
    }
}

/// Why a peer was denied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Peer is not a known contact
    #[error("the contact is unknown; use --anyone or --remember to talk to unknown contacts")]
    UnknownContact,

    /// Expected a named contact, peer is unknown
    #[error("expected contact '{expected}', but the contact is unknown")]
    ExpectedUnknown {
        /// Name given to `--expect`
        expected: String,
    },

    /// Expected a named contact, peer is a different contact
    #[error("expected contact '{expected}', but the contact is '{actual}'")]
    ExpectedOther {
        /// Name given to `--expect`
        expected: String,
        /// Name the peer is known as
        actual: String,
    },
}

/// Outcome of the authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Proceed. `known_as` names the peer if it is a contact.
    Allow {
        /// Contact name, if known
        known_as: Option<String>,
    },
    /// Proceed and bind the peer's fingerprint to `name`.
    AllowAndRemember {
        /// Name to remember the peer under
        name: String,
    },
    /// Proceed, but the peer asked to be remembered is already a contact.
    AllowAlreadyKnown {
        /// Existing contact name
        known_as: String,
        /// Name given to `--remember`
        requested: String,
    },
    /// Deny the peer.
    Reject(Rejection),
}

impl Decision {
    /// Whether the peer may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Reject(_))
    }

    /// Contact name the peer will be known as for this session.
    #[must_use]
    pub fn peer_name(&self) -> Option<&str> {
        match self {
            Self::Allow { known_as } => known_as.as_deref(),
            Self::AllowAndRemember { name } => Some(name),
            Self::AllowAlreadyKnown { known_as, .. } => Some(known_as),
            Self::Reject(_) => None,
        }
    }
}

/// Decide whether the peer with `fingerprint` may converse.
pub fn decide(fingerprint: &Fingerprint, contacts: &ContactBook, mode: &AuthMode) -> Decision {
    let known_as = contacts.name_of(fingerprint).map(str::to_string);

    match (mode, known_as) {
        (AuthMode::KnownOnly, None) => Decision::Reject(Rejection::UnknownContact),
        (AuthMode::KnownOnly | AuthMode::Anyone, known_as) => Decision::Allow { known_as },
        (AuthMode::Expect(expected), None) => {
            Decision::Reject(Rejection::ExpectedUnknown { expected: expected.clone() })
        },
        (AuthMode::Expect(expected), Some(actual)) => {
            if &actual == expected {
                Decision::Allow { known_as: Some(actual) }
            } else {
                Decision::Reject(Rejection::ExpectedOther { expected: expected.clone(), actual })
            }
        },
        (AuthMode::Remember(name), None) => Decision::AllowAndRemember { name: name.clone() },
        (AuthMode::Remember(requested), Some(known_as)) => {
            Decision::AllowAlreadyKnown { known_as, requested: requested.clone() }
        },
    }
}
