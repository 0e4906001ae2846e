//! Tenant switch protocol: changing the active team, copying data between
//! teams, and destroying-and-rebuilding a team's database.

use crate::error::CoreResult;
use crate::manager::DatabaseManager;
use crate::notify::{ChangeAction, ChangeEvent};
use crate::types::TeamId;
use rotadb_storage::Database;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

impl DatabaseManager {
    /// Makes `team` the active team and returns its ready connection.
    ///
    /// Switching to the already-active team while Ready is a no-op that
    /// returns the live connection. Otherwise the sequence is: close the
    /// current connection if open, reset connection state, update the
    /// active team id, broadcast a `teamChange` event to every subscribed
    /// store listener, then fully initialize the new team's database. The
    /// call blocks until the switch completes; no operation against the new
    /// team begins before it does.
    ///
    /// Concurrent CRUD calls issued while a switch is in flight are not
    /// queued; they race against the teardown and may land on either team.
    pub fn switch_team(&self, team: TeamId) -> CoreResult<Arc<Database>> {
        if let Some(db) = self.ready_connection(team) {
            debug!(%team, "already on requested team");
            return Ok(db);
        }

        let (old_team, old_conn) = self.reset_for_switch(team);
        if let Some(db) = old_conn {
            db.close();
            info!(team = %old_team, "closed previous team connection");
        }

        info!(from = %old_team, to = %team, "switching team");
        self.bus().broadcast(|store| ChangeEvent {
            store_name: store.to_string(),
            action: ChangeAction::TeamChange,
            data: Some(json!({
                "oldTeamId": old_team.as_u32(),
                "newTeamId": team.as_u32(),
            })),
            team_id: team,
        });

        self.init(Some(team))
    }

    /// Copies the named stores' contents from one team to another.
    ///
    /// Reads every listed store while switched to `from`, replace-writes the
    /// non-empty ones while switched to `to`, then switches back to whatever
    /// team was active before the call. An empty source store leaves the
    /// destination store untouched. Returns false if any step failed; the
    /// copy is not transactional across teams and a partial copy may
    /// persist.
    pub fn copy_data_between_teams(&self, from: TeamId, to: TeamId, stores: &[&str]) -> bool {
        info!(%from, %to, ?stores, "copying data between teams");
        match self.copy_between(from, to, stores) {
            Ok(()) => {
                info!(%from, %to, "data copied between teams");
                true
            }
            Err(e) => {
                error!(%from, %to, error = %e, "copy between teams aborted");
                false
            }
        }
    }

    fn copy_between(&self, from: TeamId, to: TeamId, stores: &[&str]) -> CoreResult<()> {
        let original = self.current_team_id();

        self.switch_team(from)?;
        let mut snapshots = Vec::with_capacity(stores.len());
        for store in stores {
            snapshots.push((*store, self.get_all(store)?));
        }

        self.switch_team(to)?;
        for (store, items) in snapshots {
            if !items.is_empty() {
                self.save_all(store, items)?;
            }
        }

        self.switch_team(original)?;
        Ok(())
    }

    /// Destroys and rebuilds the active team's database.
    ///
    /// Closes the connection, deletes the physical database - every store
    /// and record for this team is lost - and reopens it, which re-runs the
    /// full migration path as for a brand-new database. Returns false on
    /// failure; callers must check the flag.
    pub fn reinitialize_database(&self) -> bool {
        match self.reinitialize() {
            Ok(()) => {
                info!(team = %self.current_team_id(), "database reinitialized");
                true
            }
            Err(e) => {
                error!(team = %self.current_team_id(), error = %e, "reinitialization failed");
                false
            }
        }
    }

    fn reinitialize(&self) -> CoreResult<()> {
        let team = self.current_team_id();
        info!(%team, "reinitializing team database");

        if let Some(db) = self.take_connection() {
            db.close();
        }
        self.engine()
            .delete_database(&self.config().database_name(team))?;
        self.init(None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::schema;
    use parking_lot::Mutex;
    use serde_json::json;

    fn manager() -> DatabaseManager {
        DatabaseManager::new(ManagerConfig::default()).unwrap()
    }

    #[test]
    fn switch_changes_active_team_and_database() {
        let manager = manager();
        let db0 = manager.init(None).unwrap();
        assert_eq!(db0.name(), "rotadb_team0");

        let db1 = manager.switch_team(TeamId::new(1)).unwrap();
        assert_eq!(db1.name(), "rotadb_team1");
        assert_eq!(manager.current_team_id(), TeamId::new(1));
        assert!(!db0.is_open());
    }

    #[test]
    fn switch_to_same_team_is_a_noop() {
        let manager = manager();
        let first = manager.switch_team(TeamId::new(2)).unwrap();
        let second = manager.switch_team(TeamId::new(2)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_open());
    }

    #[test]
    fn teams_are_isolated() {
        let manager = manager();
        manager.save(schema::ROLES, json!({"name": "only team 0"})).unwrap();

        manager.switch_team(TeamId::new(1)).unwrap();
        assert!(manager.get_all(schema::ROLES).unwrap().is_empty());

        manager.switch_team(TeamId::new(0)).unwrap();
        assert_eq!(manager.get_all(schema::ROLES).unwrap().len(), 1);
    }

    #[test]
    fn switch_broadcasts_old_and_new_team_ids() {
        let manager = manager();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = manager.subscribe(schema::ROLES, move |e| sink.lock().push(e.clone()));

        manager.switch_team(TeamId::new(3)).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ChangeAction::TeamChange);
        assert_eq!(
            events[0].data,
            Some(json!({"oldTeamId": 0, "newTeamId": 3}))
        );
        assert_eq!(events[0].team_id, TeamId::new(3));
    }

    #[test]
    fn copy_copies_values_and_restores_active_team() {
        let manager = manager();
        manager
            .save_all(
                schema::ROLES,
                vec![json!({"name": "a"}), json!({"name": "b"}), json!({"name": "c"})],
            )
            .unwrap();

        assert!(manager.copy_data_between_teams(
            TeamId::new(0),
            TeamId::new(1),
            &[schema::ROLES]
        ));

        // Back on the team that was active before the call.
        assert_eq!(manager.current_team_id(), TeamId::new(0));
        assert_eq!(manager.get_all(schema::ROLES).unwrap().len(), 3);

        manager.switch_team(TeamId::new(1)).unwrap();
        let copied = manager.get_all(schema::ROLES).unwrap();
        assert_eq!(copied.len(), 3);
        assert_eq!(copied[0]["name"], json!("a"));
    }

    #[test]
    fn copy_skips_empty_source_stores() {
        let manager = manager();

        // Give the destination pre-existing data, leave the source empty.
        manager.switch_team(TeamId::new(1)).unwrap();
        manager.save(schema::ROLES, json!({"name": "kept"})).unwrap();
        manager.switch_team(TeamId::new(0)).unwrap();

        assert!(manager.copy_data_between_teams(
            TeamId::new(0),
            TeamId::new(1),
            &[schema::ROLES]
        ));

        manager.switch_team(TeamId::new(1)).unwrap();
        let roles = manager.get_all(schema::ROLES).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0]["name"], json!("kept"));
    }

    #[test]
    fn copy_of_unknown_store_reports_failure() {
        let manager = manager();
        assert!(!manager.copy_data_between_teams(
            TeamId::new(0),
            TeamId::new(1),
            &["nonexistent"]
        ));
    }

    #[test]
    fn reinitialize_wipes_the_active_team_only() {
        let manager = manager();
        manager.save(schema::ROLES, json!({"name": "gone"})).unwrap();

        manager.switch_team(TeamId::new(1)).unwrap();
        manager.save(schema::ROLES, json!({"name": "safe"})).unwrap();
        manager.switch_team(TeamId::new(0)).unwrap();

        assert!(manager.reinitialize_database());
        assert!(manager.get_all(schema::ROLES).unwrap().is_empty());

        // Reinitialization re-runs the migration path: defaults are back.
        assert!(manager
            .get_by_id(schema::COLOR_GROUPS, schema::SINGLETON_KEY)
            .unwrap()
            .is_some());

        manager.switch_team(TeamId::new(1)).unwrap();
        assert_eq!(manager.get_all(schema::ROLES).unwrap().len(), 1);
    }
}
