//! Manager configuration.

use crate::schema;
use crate::types::TeamId;
use rotadb_storage::{MemoryBackend, StorageBackend};
use std::sync::Arc;

/// Configuration for constructing a [`crate::DatabaseManager`].
///
/// The default configuration uses an in-memory backend, which is what tests
/// and throwaway sessions want; persistent deployments inject a
/// [`rotadb_storage::DirBackend`].
#[derive(Clone)]
pub struct ManagerConfig {
    /// Prefix for physical database names; a team's database is named
    /// `{prefix}_team{id}`.
    pub name_prefix: String,

    /// Schema version the manager opens databases at.
    pub schema_version: u32,

    /// Key prefix under which legacy flat-store data was written.
    pub legacy_prefix: String,

    /// Backend every physical database is persisted through.
    pub backend: Arc<dyn StorageBackend>,
}

impl ManagerConfig {
    /// Creates a configuration over the given backend with default naming.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            name_prefix: "rotadb".to_string(),
            schema_version: schema::SCHEMA_VERSION,
            legacy_prefix: "rotations_".to_string(),
            backend,
        }
    }

    /// Sets the physical database name prefix.
    #[must_use]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Sets the schema version databases are opened at.
    #[must_use]
    pub fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Sets the legacy flat-store key prefix.
    #[must_use]
    pub fn legacy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.legacy_prefix = prefix.into();
        self
    }

    /// Returns the physical database name for a team.
    #[must_use]
    pub fn database_name(&self, team: TeamId) -> String {
        format!("{}_team{}", self.name_prefix, team.as_u32())
    }

    /// Returns the legacy flat-store key for a team.
    ///
    /// Keys are team-qualified only for non-zero teams, matching how the
    /// flat store was written before teams existed.
    #[must_use]
    pub fn legacy_key(&self, team: TeamId, key: &str) -> String {
        if team.as_u32() > 0 {
            format!("{}team{}_{}", self.legacy_prefix, team.as_u32(), key)
        } else {
            format!("{}{}", self.legacy_prefix, key)
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("name_prefix", &self.name_prefix)
            .field("schema_version", &self.schema_version)
            .field("legacy_prefix", &self.legacy_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_names_are_team_qualified() {
        let config = ManagerConfig::default();
        assert_eq!(config.database_name(TeamId::new(0)), "rotadb_team0");
        assert_eq!(config.database_name(TeamId::new(2)), "rotadb_team2");
    }

    #[test]
    fn legacy_keys_qualify_nonzero_teams_only() {
        let config = ManagerConfig::default();
        assert_eq!(config.legacy_key(TeamId::new(0), "roles"), "rotations_roles");
        assert_eq!(
            config.legacy_key(TeamId::new(2), "roles"),
            "rotations_team2_roles"
        );
    }

    #[test]
    fn builder_overrides() {
        let config = ManagerConfig::default()
            .name_prefix("app")
            .schema_version(2)
            .legacy_prefix("old_");

        assert_eq!(config.database_name(TeamId::new(1)), "app_team1");
        assert_eq!(config.schema_version, 2);
        assert_eq!(config.legacy_key(TeamId::new(0), "k"), "old_k");
    }
}
