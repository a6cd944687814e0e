//! Contact persistence.
//!
//! The store is a line-oriented text file, one `name fingerprint-hex` pair per
//! line. The session only needs the [`ContactStore::save`] half: the book is
//! loaded once at startup by the binary and flushed after a remember decision.

use std::{
    fmt::Write as _,
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};

use super::{ContactBook, ContactError, Fingerprint};

/// Errors loading or saving the contact store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactStoreError {
    /// Filesystem operation failed
    #[error("contacts file {path}: {message}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// Line could not be parsed
    #[error("contacts file line {line}: {reason}")]
    Malformed {
        /// One-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },
}

impl ContactStoreError {
    fn io(path: &Path, err: &io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), message: err.to_string() }
    }

    fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed { line, reason: reason.into() }
    }
}

/// Destination for contact book updates.
///
/// Implementations must make each save a single atomic replacement: a crash
/// mid-save leaves either the old or the new contents, never a mix.
pub trait ContactStore: Send {
    /// Persist every entry of `book` except the local identity.
    fn save(&mut self, book: &ContactBook) -> Result<(), ContactStoreError>;
}

/// Contact store backed by a text file.
#[derive(Debug, Clone)]
pub struct FileContactStore {
    path: PathBuf,
}

impl FileContactStore {
    /// Store at `path`. Nothing is touched until [`FileContactStore::load`] or
    /// [`ContactStore::save`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the contact file, creating an empty one if it does not exist.
    pub fn load(&mut self) -> Result<ContactBook, ContactStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let book = Self::parse(&text)?;
                debug!(path = %self.path.display(), contacts = book.len(), "loaded contacts");
                Ok(book)
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("creating a new contacts file ({})", self.path.display());
                let book = ContactBook::new();
                self.save(&book)?;
                Ok(book)
            },
            Err(err) => Err(ContactStoreError::io(&self.path, &err)),
        }
    }

    /// Parse contact file contents.
    ///
    /// Blank lines are skipped. Every other line must hold exactly a name and a
    /// hex fingerprint separated by whitespace.
    pub fn parse(text: &str) -> Result<ContactBook, ContactStoreError> {
        let mut book = ContactBook::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let mut fields = raw.split_whitespace();

            let Some(name) = fields.next() else {
                continue;
            };
            let fingerprint = fields
                .next()
                .ok_or_else(|| ContactStoreError::malformed(line, "missing fingerprint"))?;
            if fields.next().is_some() {
                return Err(ContactStoreError::malformed(line, "trailing fields"));
            }

            let fingerprint = Fingerprint::from_hex(fingerprint)
                .map_err(|e| ContactStoreError::malformed(line, format!("bad fingerprint: {e}")))?;
            if fingerprint.as_bytes().is_empty() {
                return Err(ContactStoreError::malformed(line, "empty fingerprint"));
            }

            book.insert(name, fingerprint)
                .map_err(|e: ContactError| ContactStoreError::malformed(line, e.to_string()))?;
        }

        Ok(book)
    }

    /// Render the persistent entries of `book`, sorted by name.
    #[must_use]
    pub fn render(book: &ContactBook) -> String {
        let mut out = String::new();
        for (name, fingerprint) in book.persistent() {
            // Writing to a String cannot fail
            let _ = writeln!(out, "{name:<20} {fingerprint}");
        }
        out
    }
}

impl ContactStore for FileContactStore {
    fn save(&mut self, book: &ContactBook) -> Result<(), ContactStoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ContactStoreError::io(&self.path, &e))?;
        temp.write_all(Self::render(book).as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| ContactStoreError::io(&self.path, &e))?;
        temp.persist(&self.path).map_err(|e| ContactStoreError::io(&self.path, &e.error))?;

        debug!(path = %self.path.display(), "saved contacts");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SELF_NAME;

    fn fp(hex: &str) -> Fingerprint {
        Fingerprint::from_hex(hex).unwrap()
    }

    #[test]
    fn parse_accepts_padding_and_blank_lines() {
        let book = FileContactStore::parse("alice                aa11\n\n  bob  BB22  \n").unwrap();

        assert_eq!(book.name_of(&fp("aa11")), Some("alice"));
        assert_eq!(book.name_of(&fp("bb22")), Some("bob"));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn parse_names_the_bad_line() {
        let err = FileContactStore::parse("alice aa11\nbob\n").unwrap_err();
        assert_eq!(err, ContactStoreError::malformed(2, "missing fingerprint"));

        let err = FileContactStore::parse("alice zz\n").unwrap_err();
        assert!(matches!(err, ContactStoreError::Malformed { line: 1, .. }));

        let err = FileContactStore::parse("alice aa11\ncarol aa11\n").unwrap_err();
        assert!(matches!(err, ContactStoreError::Malformed { line: 2, .. }));
    }

    #[test]
    fn render_is_sorted_and_skips_self() {
        let mut book = ContactBook::new();
        book.insert("zed", fp("cc33")).unwrap();
        book.insert("alice", fp("aa11")).unwrap();
        book.set_self(fp("ff00"));

        let text = FileContactStore::render(&book);
        assert_eq!(text, format!("{:<20} aa11\n{:<20} cc33\n", "alice", "zed"));
        assert!(!text.contains(SELF_NAME));
    }

    #[test]
    fn load_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts");

        let mut store = FileContactStore::new(&path);
        let book = store.load().unwrap();

        assert!(book.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn save_then_load_preserves_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileContactStore::new(dir.path().join("contacts"));

        let mut book = ContactBook::new();
        book.insert("alice", fp("aa11")).unwrap();
        book.insert("bob", fp("bb22")).unwrap();
        store.save(&book).unwrap();

        assert_eq!(store.load().unwrap(), book);
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts");
        fs::write(&path, "stale aa11\n").unwrap();

        let mut book = ContactBook::new();
        book.insert("fresh", fp("bb22")).unwrap();
        FileContactStore::new(&path).save(&book).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("fresh"));
        assert!(!text.contains("stale"));
    }
}
