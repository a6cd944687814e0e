//! Contact registry.
//!
//! A [`ContactBook`] binds human-readable names to peer [`Fingerprint`]s in
//! both directions. It is the only input to authorization decisions besides the
//! configured [`AuthMode`](crate::AuthMode).
//!
//! # Invariants
//!
//! - A fingerprint is bound to at most one name, and a name to at most one
//!   fingerprint.
//! - The reserved [`SELF_NAME`] entry denotes the local identity. It is never
//!   persisted (see [`store`]).

pub mod store;

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use thiserror::Error;

/// Reserved name for the local identity.
pub const SELF_NAME: &str = "self";

/// Opaque digest identifying a peer's public key.
///
/// Displayed and persisted as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Wrap raw digest bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex fingerprint (either case).
    ///
    /// # Errors
    ///
    /// - `hex::FromHexError` if the text is not valid hex
    pub fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(text).map(Self)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Errors mutating a [`ContactBook`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// Name already bound to a fingerprint
    #[error("contact name '{0}' is already in use")]
    DuplicateName(String),

    /// Fingerprint already bound to a name
    #[error("fingerprint {fingerprint} is already known as '{name}'")]
    DuplicateFingerprint {
        /// Fingerprint being inserted
        fingerprint: Fingerprint,
        /// Name it is already bound to
        name: String,
    },

    /// Name is reserved or cannot be stored in the contact file
    #[error("invalid contact name '{0}'")]
    InvalidName(String),
}

/// Bidirectional name ↔ fingerprint mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactBook {
    by_name: BTreeMap<String, Fingerprint>,
    by_fingerprint: HashMap<Fingerprint, String>,
}

impl ContactBook {
    /// Create an empty contact book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` can be stored in the contact file.
    ///
    /// Names are whitespace-separated on disk, so they must be non-empty and
    /// contain no whitespace.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && !name.chars().any(char::is_whitespace)
    }

    /// Bind `name` to `fingerprint`.
    ///
    /// # Errors
    ///
    /// - `ContactError::InvalidName` for [`SELF_NAME`] or names containing
    ///   whitespace
    /// - `ContactError::DuplicateName` if the name is taken
    /// - `ContactError::DuplicateFingerprint` if the fingerprint is bound
    pub fn insert(&mut self, name: &str, fingerprint: Fingerprint) -> Result<(), ContactError> {
        if name == SELF_NAME || !Self::is_valid_name(name) {
            return Err(ContactError::InvalidName(name.to_string()));
        }

        self.bind(name, fingerprint)
    }

    /// Register the local identity under [`SELF_NAME`].
    ///
    /// Replaces a previous local identity. If the fingerprint is already bound
    /// to a regular contact, that binding wins and no `self` entry is added.
    pub fn set_self(&mut self, fingerprint: Fingerprint) {
        if let Some(old) = self.by_name.remove(SELF_NAME) {
            self.by_fingerprint.remove(&old);
        }

        if self.by_fingerprint.contains_key(&fingerprint) {
            return;
        }

        self.by_fingerprint.insert(fingerprint.clone(), SELF_NAME.to_string());
        self.by_name.insert(SELF_NAME.to_string(), fingerprint);
    }

    fn bind(&mut self, name: &str, fingerprint: Fingerprint) -> Result<(), ContactError> {
        if self.by_name.contains_key(name) {
            return Err(ContactError::DuplicateName(name.to_string()));
        }

        if let Some(existing) = self.by_fingerprint.get(&fingerprint) {
            return Err(ContactError::DuplicateFingerprint {
                fingerprint,
                name: existing.clone(),
            });
        }

        self.by_fingerprint.insert(fingerprint.clone(), name.to_string());
        self.by_name.insert(name.to_string(), fingerprint);

        debug_assert_eq!(self.by_name.len(), self.by_fingerprint.len());
        Ok(())
    }

    /// Name bound to `fingerprint`, if known.
    #[must_use]
    pub fn name_of(&self, fingerprint: &Fingerprint) -> Option<&str> {
        self.by_fingerprint.get(fingerprint).map(String::as_str)
    }

    /// Fingerprint bound to `name`, if known.
    #[must_use]
    pub fn fingerprint_of(&self, name: &str) -> Option<&Fingerprint> {
        self.by_name.get(name)
    }

    /// Whether `name` is bound.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All entries sorted by name, including [`SELF_NAME`].
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.by_name.iter().map(|(name, fp)| (name.as_str(), fp))
    }

    /// Entries that belong in the contact store (everything except
    /// [`SELF_NAME`]).
    pub fn persistent(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.iter().filter(|(name, _)| *name != SELF_NAME)
    }

    /// Number of entries, including [`SELF_NAME`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the book has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(hex: &str) -> Fingerprint {
        Fingerprint::from_hex(hex).unwrap()
    }

    #[test]
    fn lookups_work_both_ways() {
        let mut book = ContactBook::new();
        book.insert("alice", fp("aa11")).unwrap();

        assert_eq!(book.name_of(&fp("AA11")), Some("alice"));
        assert_eq!(book.fingerprint_of("alice"), Some(&fp("aa11")));
        assert_eq!(book.name_of(&fp("bb22")), None);
    }

    #[test]
    fn names_and_fingerprints_are_unique() {
        let mut book = ContactBook::new();
        book.insert("alice", fp("aa11")).unwrap();

        assert_eq!(
            book.insert("alice", fp("bb22")),
            Err(ContactError::DuplicateName("alice".to_string()))
        );
        assert_eq!(
            book.insert("bob", fp("aa11")),
            Err(ContactError::DuplicateFingerprint {
                fingerprint: fp("aa11"),
                name: "alice".to_string()
            })
        );
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn self_is_reserved_and_not_persistent() {
        let mut book = ContactBook::new();
        book.insert("alice", fp("aa11")).unwrap();
        book.set_self(fp("ff00"));

        assert!(matches!(book.insert(SELF_NAME, fp("cc33")), Err(ContactError::InvalidName(_))));
        assert_eq!(book.name_of(&fp("ff00")), Some(SELF_NAME));

        let persisted: Vec<_> = book.persistent().map(|(name, _)| name).collect();
        assert_eq!(persisted, vec!["alice"]);
    }

    #[test]
    fn set_self_replaces_previous_identity() {
        let mut book = ContactBook::new();
        book.set_self(fp("ff00"));
        book.set_self(fp("ff01"));

        assert_eq!(book.name_of(&fp("ff00")), None);
        assert_eq!(book.fingerprint_of(SELF_NAME), Some(&fp("ff01")));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn set_self_keeps_existing_contact_binding() {
        let mut book = ContactBook::new();
        book.insert("laptop", fp("ff00")).unwrap();
        book.set_self(fp("ff00"));

        assert_eq!(book.name_of(&fp("ff00")), Some("laptop"));
        assert!(!book.contains_name(SELF_NAME));
    }

    #[test]
    fn whitespace_names_are_rejected() {
        let mut book = ContactBook::new();
        assert!(book.insert("two words", fp("aa11")).is_err());
        assert!(book.insert("", fp("aa11")).is_err());
    }
}
