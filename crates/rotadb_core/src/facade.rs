//! CRUD façade over the active team's stores.
//!
//! Every operation transparently initializes the connection if needed, runs
//! in one per-store transaction, and notifies the store's listeners on
//! success. Transaction failures propagate to the caller untouched.

use crate::error::CoreResult;
use crate::manager::DatabaseManager;
use crate::notify::ChangeAction;
use rotadb_storage::{record_key, RecordKey, KEY_FIELD};
use serde_json::Value;
use tracing::{debug, warn};

/// Gives 1-based positional keys to records lacking one. Used by
/// replace-all writes, where slot position is the natural identity.
pub(crate) fn assign_positional_keys(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .enumerate()
        .map(|(position, mut item)| {
            if record_key(&item).is_none() {
                if let Some(fields) = item.as_object_mut() {
                    fields.insert(KEY_FIELD.to_string(), Value::from(position as u64 + 1));
                }
            }
            item
        })
        .collect()
}

impl DatabaseManager {
    /// Upserts one record: a record carrying an `id` replaces the record
    /// with that key, a keyless record is inserted with a generated key.
    ///
    /// Returns the record as stored (with its key) and fires a `save`
    /// notification carrying it.
    pub fn save(&self, store: &str, record: Value) -> CoreResult<Value> {
        let db = self.connection()?;
        let has_key = record_key(&record).is_some();

        let key: RecordKey = db.transact(store, |txn| {
            if has_key {
                txn.put(record.clone())
            } else {
                txn.add(record.clone())
            }
        })?;

        let stored = db.get(store, key)?.unwrap_or(record);
        debug!(store, key, team = %self.current_team_id(), "record saved");
        self.notify(store, ChangeAction::Save, Some(stored.clone()));
        Ok(stored)
    }

    /// Replaces the store's entire contents with `items`.
    ///
    /// This is a destructive replace-all, not a merge: callers supply the
    /// complete desired contents. Items lacking an `id` are keyed by their
    /// 1-based position. Returns the list as stored and fires a `saveAll`
    /// notification carrying it.
    pub fn save_all(&self, store: &str, items: Vec<Value>) -> CoreResult<Vec<Value>> {
        let db = self.connection()?;
        let keyed = assign_positional_keys(items);

        db.transact(store, |txn| {
            txn.clear();
            for item in &keyed {
                txn.add(item.clone())?;
            }
            Ok(())
        })?;

        debug!(
            store,
            count = keyed.len(),
            team = %self.current_team_id(),
            "store contents replaced"
        );
        self.notify(store, ChangeAction::SaveAll, Some(Value::Array(keyed.clone())));
        Ok(keyed)
    }

    /// Returns every record in the store, in store iteration order.
    pub fn get_all(&self, store: &str) -> CoreResult<Vec<Value>> {
        let db = self.connection()?;
        let items = db.get_all(store)?;
        debug!(store, count = items.len(), "records loaded");
        Ok(items)
    }

    /// Returns the record with the given key, or `None` if absent.
    pub fn get_by_id(&self, store: &str, id: RecordKey) -> CoreResult<Option<Value>> {
        let db = self.connection()?;
        Ok(db.get(store, id)?)
    }

    /// Removes the record with the given key and fires a `delete`
    /// notification with the id. Removing an absent key succeeds.
    pub fn delete(&self, store: &str, id: RecordKey) -> CoreResult<()> {
        let db = self.connection()?;
        db.transact(store, |txn| {
            txn.delete(id);
            Ok(())
        })?;

        debug!(store, id, team = %self.current_team_id(), "record deleted");
        self.notify(store, ChangeAction::Delete, Some(serde_json::json!({"id": id})));
        Ok(())
    }

    /// Empties the store and fires a `clear` notification with no payload.
    pub fn clear(&self, store: &str) -> CoreResult<()> {
        let db = self.connection()?;
        db.transact(store, |txn| {
            txn.clear();
            Ok(())
        })?;

        debug!(store, team = %self.current_team_id(), "store cleared");
        self.notify(store, ChangeAction::Clear, None);
        Ok(())
    }

    /// Returns true if the store holds no records.
    ///
    /// A store that cannot be read is reported as empty; callers use this
    /// for "needs seeding" checks where that is the safe answer.
    pub fn is_store_empty(&self, store: &str) -> bool {
        match self.get_all(store) {
            Ok(items) => items.is_empty(),
            Err(e) => {
                warn!(store, error = %e, "failed to check store, reporting empty");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::notify::ChangeEvent;
    use crate::schema;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> DatabaseManager {
        DatabaseManager::new(ManagerConfig::default()).unwrap()
    }

    fn collect_events(manager: &DatabaseManager, store: &str) -> Arc<Mutex<Vec<ChangeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        // Leak the subscription handle; these managers are test-scoped.
        let _sub = manager.subscribe(store, move |e| sink.lock().push(e.clone()));
        events
    }

    #[test]
    fn save_assigns_generated_key_and_notifies() {
        let manager = manager();
        let events = collect_events(&manager, schema::ROLES);

        let stored = manager
            .save(schema::ROLES, json!({"name": "Operator"}))
            .unwrap();
        assert_eq!(stored["id"], json!(1));

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ChangeAction::Save);
        assert_eq!(events[0].data.as_ref().unwrap()["id"], json!(1));
    }

    #[test]
    fn save_twice_with_same_id_upserts() {
        let manager = manager();
        manager
            .save(schema::ROLES, json!({"id": 5, "name": "first"}))
            .unwrap();
        manager
            .save(schema::ROLES, json!({"id": 5, "name": "second"}))
            .unwrap();

        let all = manager.get_all(schema::ROLES).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], json!({"id": 5, "name": "second"}));
    }

    #[test]
    fn save_all_keys_positionally() {
        let manager = manager();
        let events = collect_events(&manager, schema::COLLABORATORS);

        let items = vec![
            json!({"name": "Ana"}),
            json!({"id": 9, "name": "Bo"}),
            json!({"name": "Cy"}),
        ];
        let stored = manager.save_all(schema::COLLABORATORS, items).unwrap();

        assert_eq!(stored[0]["id"], json!(1));
        assert_eq!(stored[1]["id"], json!(9));
        assert_eq!(stored[2]["id"], json!(3));

        let all = manager.get_all(schema::COLLABORATORS).unwrap();
        assert_eq!(all.len(), 3);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ChangeAction::SaveAll);
    }

    #[test]
    fn save_all_replaces_previous_contents() {
        let manager = manager();
        manager
            .save_all(schema::ROLES, vec![json!({"name": "a"}), json!({"name": "b"})])
            .unwrap();
        manager
            .save_all(schema::ROLES, vec![json!({"name": "only"})])
            .unwrap();

        let all = manager.get_all(schema::ROLES).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["name"], json!("only"));
    }

    #[test]
    fn get_by_id_of_missing_key_is_none() {
        let manager = manager();
        assert_eq!(manager.get_by_id(schema::ROLES, 77).unwrap(), None);
    }

    #[test]
    fn delete_missing_id_succeeds_and_changes_nothing() {
        let manager = manager();
        manager.save(schema::ROLES, json!({"name": "keep"})).unwrap();

        manager.delete(schema::ROLES, 99).unwrap();
        assert_eq!(manager.get_all(schema::ROLES).unwrap().len(), 1);
    }

    #[test]
    fn delete_notifies_with_id() {
        let manager = manager();
        let events = collect_events(&manager, schema::ROLES);

        manager.save(schema::ROLES, json!({"id": 2, "name": "x"})).unwrap();
        manager.delete(schema::ROLES, 2).unwrap();

        let events = events.lock();
        assert_eq!(events.last().unwrap().action, ChangeAction::Delete);
        assert_eq!(events.last().unwrap().data, Some(json!({"id": 2})));
    }

    #[test]
    fn clear_notifies_without_payload() {
        let manager = manager();
        let events = collect_events(&manager, schema::ROLES);

        manager.save(schema::ROLES, json!({"name": "x"})).unwrap();
        manager.clear(schema::ROLES).unwrap();

        assert!(manager.get_all(schema::ROLES).unwrap().is_empty());
        let events = events.lock();
        assert_eq!(events.last().unwrap().action, ChangeAction::Clear);
        assert_eq!(events.last().unwrap().data, None);
    }

    #[test]
    fn unknown_store_errors_propagate() {
        let manager = manager();
        assert!(manager.get_all("nonexistent").is_err());
        assert!(manager.save("nonexistent", json!({})).is_err());
    }

    #[test]
    fn is_store_empty_reflects_contents() {
        let manager = manager();
        assert!(manager.is_store_empty(schema::ROLES));
        manager.save(schema::ROLES, json!({"name": "x"})).unwrap();
        assert!(!manager.is_store_empty(schema::ROLES));
        // Unreadable stores count as empty.
        assert!(manager.is_store_empty("nonexistent"));
    }

    #[test]
    fn failed_save_does_not_notify() {
        let manager = manager();
        let events = collect_events(&manager, schema::COVERAGE);

        // coverage requires an explicit key, so a keyless save fails.
        assert!(manager.save(schema::COVERAGE, json!({"v": 1})).is_err());
        assert!(events.lock().is_empty());
    }
}
