//! Open database handle and persisted state.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::transaction::StoreTxn;
use crate::types::{IndexSpec, KeyPolicy, RecordKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// A secondary index as persisted with its store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexDef {
    /// Index name.
    pub name: String,
    /// Record fields the index key is built from.
    pub fields: Vec<String>,
}

impl IndexDef {
    pub(crate) fn from_spec(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            fields: spec.fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// Encodes index component values into a deterministic lookup key.
pub(crate) fn encode_index_key(values: &[Value]) -> String {
    Value::Array(values.to_vec()).to_string()
}

/// Contents and key policy of one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoreData {
    /// Whether keyless inserts receive a generated key.
    pub auto_increment: bool,
    /// Declared secondary indexes.
    pub indexes: Vec<IndexDef>,
    /// Next key handed out to a keyless insert.
    pub next_key: RecordKey,
    /// Records in primary-key order.
    pub records: BTreeMap<RecordKey, Value>,
    /// Index lookups, rebuilt from `records`; never persisted.
    #[serde(skip)]
    pub lookups: HashMap<String, BTreeMap<String, Vec<RecordKey>>>,
}

impl StoreData {
    pub(crate) fn new(key: KeyPolicy, indexes: &[IndexSpec]) -> Self {
        Self {
            auto_increment: key.is_auto(),
            indexes: indexes.iter().map(IndexDef::from_spec).collect(),
            next_key: 1,
            records: BTreeMap::new(),
            lookups: HashMap::new(),
        }
    }

    /// Rebuilds every index lookup table from the records.
    ///
    /// Records missing an indexed field are left out of that index.
    pub(crate) fn rebuild_lookups(&mut self) {
        let mut lookups = HashMap::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let mut table: BTreeMap<String, Vec<RecordKey>> = BTreeMap::new();
            for (key, record) in &self.records {
                let components: Option<Vec<Value>> = index
                    .fields
                    .iter()
                    .map(|f| record.get(f).cloned())
                    .collect();
                if let Some(components) = components {
                    table
                        .entry(encode_index_key(&components))
                        .or_default()
                        .push(*key);
                }
            }
            lookups.insert(index.name.clone(), table);
        }
        self.lookups = lookups;
    }
}

/// Persisted state of a physical database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DbState {
    /// Schema version embedded in the database.
    pub version: u32,
    /// Stores by name.
    pub stores: BTreeMap<String, StoreData>,
}

impl DbState {
    pub(crate) fn new() -> Self {
        Self {
            version: 0,
            stores: BTreeMap::new(),
        }
    }

    pub(crate) fn rebuild_lookups(&mut self) {
        for store in self.stores.values_mut() {
            store.rebuild_lookups();
        }
    }

    pub(crate) fn encode(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StorageError::corrupted(format!("encode: {e}")))
    }

    pub(crate) fn decode(bytes: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::corrupted(format!("decode: {e}")))
    }
}

/// An open handle to one physical database.
///
/// The handle exposes named stores with per-store transactions and direct
/// reads. Every committed transaction persists a full snapshot through the
/// backend, so the on-disk blob always reflects the last commit.
///
/// # Example
///
/// ```rust,ignore
/// let db = engine.open("app_db", 1, upgrade)?;
/// db.transact("users", |txn| {
///     txn.put(json!({"id": 1, "name": "Alice"}))?;
///     Ok(())
/// })?;
/// let users = db.get_all("users")?;
/// ```
pub struct Database {
    name: String,
    backend: Arc<dyn StorageBackend>,
    state: RwLock<DbState>,
    is_open: RwLock<bool>,
}

impl Database {
    pub(crate) fn from_state(
        name: String,
        backend: Arc<dyn StorageBackend>,
        state: DbState,
    ) -> Self {
        Self {
            name,
            backend,
            state: RwLock::new(state),
            is_open: RwLock::new(true),
        }
    }

    /// Returns the physical database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema version this database was opened at.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.state.read().version
    }

    /// Returns the names of all declared stores.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.state.read().stores.keys().cloned().collect()
    }

    /// Returns true if the named store is declared.
    #[must_use]
    pub fn has_store(&self, store: &str) -> bool {
        self.state.read().stores.contains_key(store)
    }

    /// Executes a read-write transaction against one store.
    ///
    /// The closure operates on a working copy; if it returns `Ok` the copy
    /// replaces the store's contents and the snapshot is persisted, otherwise
    /// nothing is applied. A persistence failure also rolls the commit back.
    pub fn transact<F, T>(&self, store: &str, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> StorageResult<T>,
    {
        self.ensure_open()?;
        let mut state = self.state.write();
        let mut working = state
            .stores
            .get(store)
            .ok_or_else(|| StorageError::unknown_store(store))?
            .clone();

        let mut txn = StoreTxn::new(store, &mut working);
        let out = f(&mut txn)?;

        working.rebuild_lookups();
        let prev = state.stores.insert(store.to_string(), working);

        let encoded = state.encode()?;
        if let Err(e) = self.backend.store(&self.name, &encoded) {
            // Roll the in-memory commit back so memory and disk stay in step.
            if let Some(prev) = prev {
                state.stores.insert(store.to_string(), prev);
            }
            return Err(e);
        }

        debug!(db = %self.name, store, "transaction committed");
        Ok(out)
    }

    /// Returns the record with the given key, or `None`.
    pub fn get(&self, store: &str, key: RecordKey) -> StorageResult<Option<Value>> {
        self.ensure_open()?;
        let state = self.state.read();
        let data = state
            .stores
            .get(store)
            .ok_or_else(|| StorageError::unknown_store(store))?;
        Ok(data.records.get(&key).cloned())
    }

    /// Returns every record in the store, in primary-key order.
    pub fn get_all(&self, store: &str) -> StorageResult<Vec<Value>> {
        self.ensure_open()?;
        let state = self.state.read();
        let data = state
            .stores
            .get(store)
            .ok_or_else(|| StorageError::unknown_store(store))?;
        Ok(data.records.values().cloned().collect())
    }

    /// Returns the records whose indexed fields equal `values`, in
    /// primary-key order.
    pub fn get_by_index(
        &self,
        store: &str,
        index: &str,
        values: &[Value],
    ) -> StorageResult<Vec<Value>> {
        self.ensure_open()?;
        let state = self.state.read();
        let data = state
            .stores
            .get(store)
            .ok_or_else(|| StorageError::unknown_store(store))?;
        let table = data
            .lookups
            .get(index)
            .ok_or_else(|| StorageError::UnknownIndex {
                store: store.to_string(),
                index: index.to_string(),
            })?;

        let keys = table.get(&encode_index_key(values));
        Ok(keys
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| data.records.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Returns the number of records in the store.
    pub fn count(&self, store: &str) -> StorageResult<usize> {
        self.ensure_open()?;
        let state = self.state.read();
        let data = state
            .stores
            .get(store)
            .ok_or_else(|| StorageError::unknown_store(store))?;
        Ok(data.records.len())
    }

    /// Closes the handle. Further operations fail with [`StorageError::Closed`].
    ///
    /// All committed data is already persisted, so closing is purely a
    /// lifecycle marker. Closing twice is a no-op.
    pub fn close(&self) {
        let mut is_open = self.is_open.write();
        if *is_open {
            *is_open = false;
            debug!(db = %self.name, "database closed");
        }
    }

    /// Returns true if the handle is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(StorageError::Closed)
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("version", &self.version())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}
