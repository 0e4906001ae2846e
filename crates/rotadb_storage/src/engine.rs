//! Engine for opening, upgrading, and deleting physical databases.

use crate::backend::StorageBackend;
use crate::database::{Database, DbState, IndexDef, StoreData};
use crate::error::{StorageError, StorageResult};
use crate::types::{IndexSpec, StoreSpec};
use std::sync::Arc;
use tracing::{debug, info};

/// Opens physical databases addressed by (name, schema version).
///
/// The engine mirrors the upgrade protocol of browser-local stores: opening
/// at a version above the on-disk version runs the caller's upgrade hook
/// before the open completes; opening below the on-disk version is refused.
///
/// An engine is cheap to clone and several may share one backend.
#[derive(Clone)]
pub struct StoreEngine {
    backend: Arc<dyn StorageBackend>,
}

impl StoreEngine {
    /// Creates an engine over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Opens the named database at the requested schema version.
    ///
    /// When the on-disk version is behind, `upgrade` runs with an
    /// [`UpgradeContext`] and the (old, requested) version pair before the
    /// open completes; an error from the hook aborts the open and nothing is
    /// persisted. A database already at the requested version opens without
    /// invoking the hook.
    ///
    /// # Errors
    ///
    /// - [`StorageError::VersionTooNew`] if the on-disk version is above the
    ///   requested version
    /// - [`StorageError::Corrupted`] if the snapshot cannot be decoded
    /// - any error surfaced by the upgrade hook or the backend
    pub fn open<F>(&self, name: &str, version: u32, upgrade: F) -> StorageResult<Database>
    where
        F: FnOnce(&mut UpgradeContext<'_>, u32, u32) -> StorageResult<()>,
    {
        let mut state = match self.backend.load(name)? {
            Some(bytes) => DbState::decode(&bytes)?,
            None => DbState::new(),
        };

        if state.version > version {
            return Err(StorageError::VersionTooNew {
                on_disk: state.version,
                requested: version,
            });
        }

        let old_version = state.version;
        if old_version < version {
            info!(db = name, old_version, version, "upgrading database");
            let mut ctx = UpgradeContext { state: &mut state };
            upgrade(&mut ctx, old_version, version)?;
            state.version = version;
            self.backend.store(name, &state.encode()?)?;
        }

        state.rebuild_lookups();
        debug!(db = name, version, "database opened");
        Ok(Database::from_state(
            name.to_string(),
            Arc::clone(&self.backend),
            state,
        ))
    }

    /// Deletes the named physical database.
    ///
    /// All of its stores and records are lost. Deleting an absent database
    /// succeeds. Open handles are not invalidated; close them first.
    pub fn delete_database(&self, name: &str) -> StorageResult<()> {
        self.backend.remove(name)?;
        info!(db = name, "database deleted");
        Ok(())
    }

    /// Returns true if the named database exists on the backend.
    pub fn database_exists(&self, name: &str) -> StorageResult<bool> {
        self.backend.exists(name)
    }
}

impl std::fmt::Debug for StoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEngine").finish_non_exhaustive()
    }
}

/// Structural operations available while an upgrade is in progress.
///
/// All operations are additive and idempotent: creating a store or index
/// that already exists is a no-op, and nothing is ever dropped.
pub struct UpgradeContext<'a> {
    state: &'a mut DbState,
}

impl UpgradeContext<'_> {
    /// Returns true if the named store exists.
    #[must_use]
    pub fn has_store(&self, name: &str) -> bool {
        self.state.stores.contains_key(name)
    }

    /// Creates the store declared by `spec` with its indexes.
    ///
    /// Returns true if the store was created, false if it already existed
    /// (existing contents are untouched either way).
    pub fn create_store(&mut self, spec: &StoreSpec) -> bool {
        if self.has_store(spec.name) {
            return false;
        }
        self.state
            .stores
            .insert(spec.name.to_string(), StoreData::new(spec.key, spec.indexes));
        debug!(store = spec.name, "store created");
        true
    }

    /// Ensures the given index exists on a store, creating it if missing.
    ///
    /// Returns true if the index was created. Used when a store predates the
    /// version that introduced one of its indexes.
    pub fn ensure_index(&mut self, store: &str, index: &IndexSpec) -> StorageResult<bool> {
        let data = self
            .state
            .stores
            .get_mut(store)
            .ok_or_else(|| StorageError::unknown_store(store))?;

        if data.indexes.iter().any(|i| i.name == index.name) {
            return Ok(false);
        }
        data.indexes.push(IndexDef::from_spec(index));
        debug!(store, index = index.name, "index created");
        Ok(true)
    }

    /// Returns the names of all existing stores.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.state.stores.keys().cloned().collect()
    }
}
