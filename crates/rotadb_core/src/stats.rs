//! Storage usage reporting.

use crate::error::CoreResult;
use crate::manager::DatabaseManager;
use crate::schema;
use crate::types::TeamId;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Returns the current time as Unix epoch milliseconds.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Usage of one store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreUsage {
    /// Number of records in the store.
    pub count: usize,
    /// Serialized size of the store's contents in bytes.
    pub size_bytes: usize,
}

/// Usage snapshot of the active team's database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUsage {
    /// Team the snapshot was taken for.
    pub team_id: TeamId,
    /// Per-store usage, keyed by store name.
    pub stores: BTreeMap<String, StoreUsage>,
    /// Sum of all stores' serialized sizes.
    pub total_size: usize,
    /// When the snapshot was gathered (Unix epoch milliseconds).
    pub gathered_at: u64,
}

impl DatabaseManager {
    /// Gathers a usage snapshot across every declared store.
    ///
    /// A store that cannot be read contributes a zero entry rather than
    /// failing the whole snapshot.
    pub fn storage_stats(&self) -> CoreResult<StorageUsage> {
        let db = self.connection()?;
        let mut stores = BTreeMap::new();
        let mut total_size = 0;

        for spec in schema::declared_stores() {
            let usage = match db.get_all(spec.name) {
                Ok(items) => {
                    let size_bytes = Value::Array(items.clone()).to_string().len();
                    StoreUsage {
                        count: items.len(),
                        size_bytes,
                    }
                }
                Err(e) => {
                    warn!(store = spec.name, error = %e, "could not gather store stats");
                    StoreUsage::default()
                }
            };
            total_size += usage.size_bytes;
            stores.insert(spec.name.to_string(), usage);
        }

        Ok(StorageUsage {
            team_id: self.current_team_id(),
            stores,
            total_size,
            gathered_at: unix_millis(),
        })
    }
}
