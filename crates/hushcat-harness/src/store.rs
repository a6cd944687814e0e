//! In-memory contact store.

use std::sync::{Arc, Mutex};

use hushcat_core::{ContactBook, ContactStore, ContactStoreError};

/// Contact store keeping a snapshot of every save.
///
/// Clones share the same record, so a test can keep one and hand the other to
/// the runtime.
#[derive(Debug, Clone, Default)]
pub struct MemoryContactStore {
    saves: Arc<Mutex<Vec<ContactBook>>>,
}

impl MemoryContactStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves so far.
    #[allow(clippy::expect_used)]
    pub fn save_count(&self) -> usize {
        self.saves.lock().expect("store lock poisoned").len()
    }

    /// Most recently saved book.
    #[allow(clippy::expect_used)]
    pub fn last_saved(&self) -> Option<ContactBook> {
        self.saves.lock().expect("store lock poisoned").last().cloned()
    }
}

impl ContactStore for MemoryContactStore {
    #[allow(clippy::expect_used)]
    fn save(&mut self, book: &ContactBook) -> Result<(), ContactStoreError> {
        self.saves.lock().expect("store lock poisoned").push(book.clone());
        Ok(())
    }
}
