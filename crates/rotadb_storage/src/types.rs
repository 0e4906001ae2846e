//! Schema declaration types shared between the engine and its callers.

use serde_json::Value;

/// The field every record is keyed by.
pub const KEY_FIELD: &str = "id";

/// Primary key of a persisted record.
///
/// Keys are non-negative integers carried in the record's `id` field.
pub type RecordKey = u64;

/// How a store assigns primary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Records must carry an explicit `id`.
    Explicit,
    /// Records without an `id` receive the next generated key on insert.
    AutoIncrement,
}

impl KeyPolicy {
    /// Returns true if the store assigns keys to keyless records.
    #[must_use]
    pub const fn is_auto(self) -> bool {
        matches!(self, Self::AutoIncrement)
    }
}

/// Declaration of a secondary index over one or more record fields.
///
/// A record missing any of the indexed fields is simply absent from the
/// index; it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name, unique within its store.
    pub name: &'static str,
    /// Record fields the index key is built from, in order.
    pub fields: &'static [&'static str],
}

/// Declaration of a named store.
///
/// Store declarations are additive: an upgrade may create missing stores and
/// indexes, but never drops existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSpec {
    /// Store name.
    pub name: &'static str,
    /// Primary key policy.
    pub key: KeyPolicy,
    /// Secondary indexes required on this store.
    pub indexes: &'static [IndexSpec],
}

/// Extracts the primary key from a record, if it carries one.
#[must_use]
pub fn record_key(record: &Value) -> Option<RecordKey> {
    record.get(KEY_FIELD).and_then(Value::as_u64)
}
