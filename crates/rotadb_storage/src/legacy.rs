//! Legacy flat key-value store.
//!
//! A plain string-keyed, string-valued store kept around for two purposes:
//! as the one-time migration source for databases created before the
//! structured stores existed, and as a cheap backup target. It is not
//! transactional and not versioned.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// The blob name the flat store is persisted under.
pub const LEGACY_STORE_NAME: &str = "legacy_kv";

/// A flat string-to-string store persisted as a single snapshot.
///
/// Tenant qualification of keys is the caller's concern; the store itself is
/// one shared namespace.
pub struct LegacyKv {
    backend: Arc<dyn StorageBackend>,
    name: String,
    entries: RwLock<BTreeMap<String, String>>,
}

impl LegacyKv {
    /// Opens the flat store persisted under [`LEGACY_STORE_NAME`].
    pub fn open(backend: Arc<dyn StorageBackend>) -> StorageResult<Self> {
        Self::open_named(backend, LEGACY_STORE_NAME)
    }

    /// Opens a flat store persisted under a custom blob name.
    ///
    /// An undecodable snapshot is treated as empty (with a warning) rather
    /// than refusing to open: the flat store only ever holds best-effort
    /// data.
    pub fn open_named(backend: Arc<dyn StorageBackend>, name: &str) -> StorageResult<Self> {
        let entries = match backend.load(name)? {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(store = name, error = %e, "legacy store undecodable, starting empty");
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };

        Ok(Self {
            backend,
            name: name.to_string(),
            entries: RwLock::new(entries),
        })
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `value` under `key` and persists the snapshot.
    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    /// Removes `key` and persists the snapshot. Removing an absent key
    /// succeeds.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    /// Returns all keys starting with `prefix`.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| StorageError::corrupted(format!("encode legacy store: {e}")))?;
        self.backend.store(&self.name, &bytes)
    }
}

impl std::fmt::Debug for LegacyKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyKv")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
