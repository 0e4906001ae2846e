//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory storage backend.
///
/// This backend keeps every blob in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// Share one instance behind an `Arc` to let several engine instances
/// converge on the same set of physical databases.
///
/// # Example
///
/// ```rust
/// use rotadb_storage::{MemoryBackend, StorageBackend};
///
/// let backend = MemoryBackend::new();
/// backend.store("db", b"snapshot").unwrap();
/// assert_eq!(backend.load("db").unwrap(), Some(b"snapshot".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all stored blobs.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }

    /// Removes every blob from the backend.
    pub fn clear(&self) {
        self.blobs.write().clear();
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(name).cloned())
    }

    fn store(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        self.blobs.write().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        self.blobs.write().remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.blobs.read().contains_key(name))
    }
}
