//! Schema migration: structural creation plus one-time data backfills.
//!
//! Migration has two phases with different failure contracts:
//!
//! - **Structural** ([`create_missing_structures`]) runs inside the engine's
//!   upgrade and is fatal on failure - missing stores would break every
//!   operation after the open.
//! - **Data** ([`backfill_data`]) runs right after the open and is
//!   best-effort - a failed import or seed is logged and tolerated, and can
//!   never corrupt the stores the structural phase created.
//!
//! Both phases are additive and idempotent; re-running a step that already
//! took effect is a no-op.

use crate::error::{CoreError, CoreResult};
use crate::facade::assign_positional_keys;
use crate::manager::DatabaseManager;
use crate::schema;
use crate::stats::unix_millis;
use crate::types::TeamId;
use rotadb_storage::{Database, StorageResult, UpgradeContext};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Ensures every declared store and index exists.
///
/// Runs inside the upgrade transaction; an error aborts the open.
pub(crate) fn create_missing_structures(
    ctx: &mut UpgradeContext<'_>,
    from_version: u32,
    to_version: u32,
) -> StorageResult<()> {
    info!(from_version, to_version, "running structural migration");

    for spec in schema::declared_stores() {
        if ctx.create_store(spec) {
            info!(store = spec.name, "store created");
        }
        for index in spec.indexes {
            // Covers stores that predate the version introducing an index.
            if ctx.ensure_index(spec.name, index)? {
                info!(store = spec.name, index = index.name, "index backfilled");
            }
        }
    }

    Ok(())
}

/// Runs the one-time data backfills for an upgrade from `from_version`.
///
/// Failures here are reported to the caller for logging but must be treated
/// as tolerable: the structural upgrade has already committed.
pub(crate) fn backfill_data(
    manager: &DatabaseManager,
    db: &Database,
    team: TeamId,
    from_version: u32,
) -> CoreResult<()> {
    if from_version < schema::LEGACY_IMPORT_BELOW {
        import_legacy(manager, db, team)
            .map_err(|e| CoreError::migration_failed(format!("legacy import: {e}")))?;
    }

    if from_version < schema::SEED_DEFAULTS_BELOW {
        seed_color_groups(db)
            .map_err(|e| CoreError::migration_failed(format!("seeding defaults: {e}")))?;
    }

    Ok(())
}

/// One-time import from the legacy flat store into the structured stores.
///
/// Each key is handled independently: a malformed payload is skipped with a
/// warning and the remaining keys still import.
fn import_legacy(manager: &DatabaseManager, db: &Database, team: TeamId) -> StorageResult<()> {
    let config = manager.config();
    let legacy = manager.legacy();
    info!(%team, "importing legacy flat-store data");

    // Record lists replace the whole store, keyed positionally like a
    // replace-all write.
    for store in [schema::ROLES, schema::COLLABORATORS] {
        let key = config.legacy_key(team, store);
        let Some(raw) = legacy.get(&key) else { continue };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(items) => {
                if let Err(e) = replace_all(db, store, items) {
                    warn!(key = %key, error = %e, "legacy import failed for store");
                } else {
                    info!(store, "legacy data imported");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "skipping malformed legacy payload"),
        }
    }

    // The coverage role list and the color group map become singleton
    // records.
    let key = config.legacy_key(team, schema::COVERAGE);
    if let Some(raw) = legacy.get(&key) {
        match serde_json::from_str::<Value>(&raw) {
            Ok(role_names) => {
                put_singleton(
                    db,
                    schema::COVERAGE,
                    json!({"id": schema::SINGLETON_KEY, "roleNames": role_names}),
                )?;
                info!(store = schema::COVERAGE, "legacy data imported");
            }
            Err(e) => warn!(key = %key, error = %e, "skipping malformed legacy payload"),
        }
    }

    let key = config.legacy_key(team, schema::COLOR_GROUPS);
    if let Some(raw) = legacy.get(&key) {
        match serde_json::from_str::<Value>(&raw) {
            Ok(groups) => {
                put_singleton(
                    db,
                    schema::COLOR_GROUPS,
                    json!({"id": schema::SINGLETON_KEY, "groups": groups}),
                )?;
                info!(store = schema::COLOR_GROUPS, "legacy data imported");
            }
            Err(e) => warn!(key = %key, error = %e, "skipping malformed legacy payload"),
        }
    }

    Ok(())
}

/// Seeds the default color group record, unless one already exists.
fn seed_color_groups(db: &Database) -> StorageResult<()> {
    if db
        .get(schema::COLOR_GROUPS, schema::SINGLETON_KEY)?
        .is_some()
    {
        return Ok(());
    }

    let now = unix_millis();
    put_singleton(
        db,
        schema::COLOR_GROUPS,
        json!({
            "id": schema::SINGLETON_KEY,
            "groups": {"blue": [], "orange": [], "green": []},
            "createdAt": now,
            "updatedAt": now,
        }),
    )?;
    info!("seeded default color groups");
    Ok(())
}

fn replace_all(db: &Database, store: &str, items: Vec<Value>) -> StorageResult<()> {
    let keyed = assign_positional_keys(items);
    db.transact(store, |txn| {
        txn.clear();
        for item in keyed {
            txn.add(item)?;
        }
        Ok(())
    })
}

fn put_singleton(db: &Database, store: &str, record: Value) -> StorageResult<()> {
    db.transact(store, |txn| {
        txn.put(record)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use rotadb_storage::{LegacyKv, MemoryBackend, StorageBackend};
    use std::sync::Arc;

    fn backend() -> Arc<dyn StorageBackend> {
        Arc::new(MemoryBackend::new())
    }

    #[test]
    fn fresh_database_seeds_color_groups() {
        let manager = DatabaseManager::new(ManagerConfig::default()).unwrap();
        let groups = manager
            .get_by_id(schema::COLOR_GROUPS, schema::SINGLETON_KEY)
            .unwrap()
            .expect("seeded");
        assert_eq!(groups["groups"]["blue"], json!([]));
        assert_eq!(groups["groups"]["orange"], json!([]));
        assert_eq!(groups["groups"]["green"], json!([]));
    }

    #[test]
    fn seeding_does_not_overwrite_existing_record() {
        let backend = backend();
        let config = ManagerConfig::new(Arc::clone(&backend));
        {
            let manager = DatabaseManager::new(config.clone()).unwrap();
            manager
                .save(
                    schema::COLOR_GROUPS,
                    json!({"id": schema::SINGLETON_KEY, "groups": {"blue": ["Ana"]}}),
                )
                .unwrap();
        }

        // A second manager over the same backend reopens at the current
        // version; the existing record must survive untouched.
        let manager = DatabaseManager::new(config).unwrap();
        let groups = manager
            .get_by_id(schema::COLOR_GROUPS, schema::SINGLETON_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(groups["groups"]["blue"], json!(["Ana"]));
    }

    #[test]
    fn legacy_lists_are_imported_for_new_databases() {
        let backend = backend();
        let legacy = LegacyKv::open(Arc::clone(&backend)).unwrap();
        legacy
            .set(
                "rotations_roles",
                r#"[{"name": "Operator"}, {"name": "Reviewer"}]"#,
            )
            .unwrap();
        legacy
            .set("rotations_collaborators", r#"[{"name": "Ana"}]"#, )
            .unwrap();

        let manager = DatabaseManager::new(ManagerConfig::new(backend)).unwrap();
        let roles = manager.get_all(schema::ROLES).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0]["id"], json!(1));
        assert_eq!(roles[1]["id"], json!(2));

        let collaborators = manager.get_all(schema::COLLABORATORS).unwrap();
        assert_eq!(collaborators.len(), 1);
    }

    #[test]
    fn legacy_singletons_are_wrapped() {
        let backend = backend();
        let legacy = LegacyKv::open(Arc::clone(&backend)).unwrap();
        legacy
            .set("rotations_coverage", r#"["Operator", "Reviewer"]"#)
            .unwrap();
        legacy
            .set("rotations_colorGroups", r#"{"blue": ["Ana"]}"#)
            .unwrap();

        let manager = DatabaseManager::new(ManagerConfig::new(backend)).unwrap();

        let coverage = manager
            .get_by_id(schema::COVERAGE, schema::SINGLETON_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(coverage["roleNames"], json!(["Operator", "Reviewer"]));

        // The imported color groups also satisfy the seed check, so the
        // default must not clobber them.
        let groups = manager
            .get_by_id(schema::COLOR_GROUPS, schema::SINGLETON_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(groups["groups"]["blue"], json!(["Ana"]));
    }

    #[test]
    fn malformed_legacy_payloads_are_skipped_per_key() {
        let backend = backend();
        let legacy = LegacyKv::open(Arc::clone(&backend)).unwrap();
        legacy.set("rotations_roles", "{not json").unwrap();
        legacy
            .set("rotations_collaborators", r#"[{"name": "Ana"}]"#)
            .unwrap();

        let manager = DatabaseManager::new(ManagerConfig::new(backend)).unwrap();

        // The broken roles payload is skipped, the good one still imports.
        assert!(manager.get_all(schema::ROLES).unwrap().is_empty());
        assert_eq!(manager.get_all(schema::COLLABORATORS).unwrap().len(), 1);
    }

    #[test]
    fn nonzero_teams_read_their_own_legacy_keys() {
        let backend = backend();
        let legacy = LegacyKv::open(Arc::clone(&backend)).unwrap();
        legacy
            .set("rotations_team2_roles", r#"[{"name": "Night shift"}]"#)
            .unwrap();
        legacy
            .set("rotations_roles", r#"[{"name": "Day shift"}]"#)
            .unwrap();

        let manager = DatabaseManager::new(ManagerConfig::new(backend)).unwrap();
        manager.switch_team(TeamId::new(2)).unwrap();

        let roles = manager.get_all(schema::ROLES).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0]["name"], json!("Night shift"));
    }

    #[test]
    fn import_runs_only_below_the_legacy_threshold() {
        let backend = backend();
        // First open at version 2: structures exist, no data yet.
        {
            let config = ManagerConfig::new(Arc::clone(&backend)).schema_version(2);
            let manager = DatabaseManager::new(config).unwrap();
            manager.init(None).unwrap();
        }

        // Legacy data written after that open must not be imported by the
        // 2 -> 3 upgrade.
        let legacy = LegacyKv::open(Arc::clone(&backend)).unwrap();
        legacy
            .set("rotations_roles", r#"[{"name": "Too late"}]"#)
            .unwrap();

        let manager = DatabaseManager::new(ManagerConfig::new(backend)).unwrap();
        assert!(manager.get_all(schema::ROLES).unwrap().is_empty());
    }
}
