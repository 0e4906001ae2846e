//! Per-store transaction API.

use crate::database::StoreData;
use crate::error::{StorageError, StorageResult};
use crate::types::{record_key, RecordKey, KEY_FIELD};
use serde_json::Value;

/// A read-write transaction scoped to one store.
///
/// Operations act on a working copy of the store; nothing is visible outside
/// the transaction until the enclosing [`super::Database::transact`] call
/// commits. Records must be JSON objects so a primary key can be carried in
/// their `id` field.
pub struct StoreTxn<'a> {
    store: &'a str,
    data: &'a mut StoreData,
}

impl<'a> StoreTxn<'a> {
    pub(crate) fn new(store: &'a str, data: &'a mut StoreData) -> Self {
        Self { store, data }
    }

    /// Inserts a record, failing on a primary-key collision.
    ///
    /// A keyless record receives the next generated key if the store
    /// auto-assigns, and is rejected otherwise. Returns the record's key.
    pub fn add(&mut self, record: Value) -> StorageResult<RecordKey> {
        let (key, record) = self.keyed(record)?;
        if self.data.records.contains_key(&key) {
            return Err(StorageError::DuplicateKey {
                store: self.store.to_string(),
                key,
            });
        }
        self.insert(key, record);
        Ok(key)
    }

    /// Inserts or replaces a record by primary key (upsert).
    ///
    /// This is the explicit insert-or-replace contract: a record carrying
    /// the key of an existing record replaces it in place. Returns the
    /// record's key.
    pub fn put(&mut self, record: Value) -> StorageResult<RecordKey> {
        let (key, record) = self.keyed(record)?;
        self.insert(key, record);
        Ok(key)
    }

    /// Returns the record with the given key, if present.
    #[must_use]
    pub fn get(&self, key: RecordKey) -> Option<Value> {
        self.data.records.get(&key).cloned()
    }

    /// Returns every record in primary-key order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Value> {
        self.data.records.values().cloned().collect()
    }

    /// Removes the record with the given key. Removing an absent key
    /// succeeds.
    pub fn delete(&mut self, key: RecordKey) {
        self.data.records.remove(&key);
    }

    /// Removes every record from the store.
    pub fn clear(&mut self) {
        self.data.records.clear();
    }

    /// Returns the number of records currently in the store.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.records.len()
    }

    /// Resolves the record's key, assigning one when the policy allows it.
    fn keyed(&mut self, mut record: Value) -> StorageResult<(RecordKey, Value)> {
        if !record.is_object() {
            return Err(StorageError::invalid_record(format!(
                "store {} holds JSON objects, got {record}",
                self.store
            )));
        }

        let key = match record_key(&record) {
            Some(key) => key,
            None if self.data.auto_increment => {
                let key = self.data.next_key;
                if let Some(fields) = record.as_object_mut() {
                    fields.insert(KEY_FIELD.to_string(), Value::from(key));
                }
                key
            }
            None => {
                return Err(StorageError::KeyRequired {
                    store: self.store.to_string(),
                })
            }
        };

        Ok((key, record))
    }

    fn insert(&mut self, key: RecordKey, record: Value) {
        self.data.records.insert(key, record);
        self.data.next_key = self.data.next_key.max(key + 1);
    }
}
