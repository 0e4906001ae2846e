//! Store schema registry.
//!
//! The registry is the single declarative description of every store a team
//! database holds. It is fixed at compile time and additive-only: versions
//! may introduce stores and indexes, never drop them.

use rotadb_storage::{IndexSpec, KeyPolicy, StoreSpec};

/// Schema version the code expects. On-disk databases below this version are
/// migrated on open; above it they are refused.
pub const SCHEMA_VERSION: u32 = 3;

/// Databases created before this version hold their data in the legacy flat
/// store and get a one-time import on upgrade.
pub const LEGACY_IMPORT_BELOW: u32 = 2;

/// Databases created before this version have no singleton defaults yet and
/// get them seeded on upgrade.
pub const SEED_DEFAULTS_BELOW: u32 = 3;

/// Roles and certifications.
pub const ROLES: &str = "roles";
/// Team members.
pub const COLLABORATORS: &str = "collaborators";
/// Shared-role configuration (legacy).
pub const COVERAGE: &str = "coverage";
/// Color group configuration.
pub const COLOR_GROUPS: &str = "colorGroups";
/// Monthly rotations.
pub const ROTATIONS: &str = "rotations";
/// General rotation system configuration.
pub const ROTATION_CONFIG: &str = "rotationConfig";
/// Per-team configuration.
pub const TEAM_CONFIG: &str = "teamConfig";

/// Index over (year, month) on the rotations store.
pub const MONTH_YEAR_INDEX: &str = "monthYear";
/// Index over the rotation number on the rotations store.
pub const ROTATION_NUMBER_INDEX: &str = "rotationNumber";

/// The key singleton records are stored under.
pub const SINGLETON_KEY: u64 = 1;

const ROTATION_INDEXES: [IndexSpec; 2] = [
    IndexSpec {
        name: MONTH_YEAR_INDEX,
        fields: &["year", "month"],
    },
    IndexSpec {
        name: ROTATION_NUMBER_INDEX,
        fields: &["rotationNumber"],
    },
];

static DECLARED_STORES: [StoreSpec; 7] = [
    StoreSpec {
        name: ROLES,
        key: KeyPolicy::AutoIncrement,
        indexes: &[],
    },
    StoreSpec {
        name: COLLABORATORS,
        key: KeyPolicy::AutoIncrement,
        indexes: &[],
    },
    StoreSpec {
        name: COVERAGE,
        key: KeyPolicy::Explicit,
        indexes: &[],
    },
    StoreSpec {
        name: COLOR_GROUPS,
        key: KeyPolicy::Explicit,
        indexes: &[],
    },
    StoreSpec {
        name: ROTATIONS,
        key: KeyPolicy::AutoIncrement,
        indexes: &ROTATION_INDEXES,
    },
    StoreSpec {
        name: ROTATION_CONFIG,
        key: KeyPolicy::Explicit,
        indexes: &[],
    },
    StoreSpec {
        name: TEAM_CONFIG,
        key: KeyPolicy::Explicit,
        indexes: &[],
    },
];

/// Returns every declared store, in registry order.
#[must_use]
pub fn declared_stores() -> &'static [StoreSpec] {
    &DECLARED_STORES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_seven_stores_are_declared() {
        let names: Vec<_> = declared_stores().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                ROLES,
                COLLABORATORS,
                COVERAGE,
                COLOR_GROUPS,
                ROTATIONS,
                ROTATION_CONFIG,
                TEAM_CONFIG
            ]
        );
    }

    #[test]
    fn rotations_carries_both_indexes() {
        let rotations = declared_stores()
            .iter()
            .find(|s| s.name == ROTATIONS)
            .unwrap();
        let index_names: Vec<_> = rotations.indexes.iter().map(|i| i.name).collect();
        assert_eq!(index_names, vec![MONTH_YEAR_INDEX, ROTATION_NUMBER_INDEX]);
    }

    #[test]
    fn singleton_stores_use_explicit_keys() {
        for name in [COVERAGE, COLOR_GROUPS, ROTATION_CONFIG, TEAM_CONFIG] {
            let spec = declared_stores().iter().find(|s| s.name == name).unwrap();
            assert_eq!(spec.key, KeyPolicy::Explicit, "{name}");
        }
    }
}
