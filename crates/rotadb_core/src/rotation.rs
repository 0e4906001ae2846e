//! Rotation and team configuration helpers.
//!
//! Thin business operations layered on the façade: rotations are looked up
//! through the `monthYear` index rather than scanned, and the two singleton
//! configuration records synthesize sensible defaults when absent.

use crate::error::CoreResult;
use crate::manager::DatabaseManager;
use crate::schema;
use crate::stats::unix_millis;
use crate::types::TeamId;
use rotadb_storage::{record_key, StorageError};
use serde_json::{json, Value};
use tracing::warn;

/// Legacy-store key the active rotation is backed up under.
const ROTATION_BACKUP_KEY: &str = "currentRotation";

fn default_team_color(team: TeamId) -> &'static str {
    match team.as_u32() {
        0 => "#3498db",
        1 => "#e74c3c",
        _ => "#2ecc71",
    }
}

impl DatabaseManager {
    /// Returns the rotation record for a month, or `None` if none was saved.
    pub fn get_rotation_by_month_year(
        &self,
        year: i32,
        month: u32,
    ) -> CoreResult<Option<Value>> {
        let db = self.connection()?;
        let hits = db.get_by_index(
            schema::ROTATIONS,
            schema::MONTH_YEAR_INDEX,
            &[json!(year), json!(month)],
        )?;
        Ok(hits.into_iter().next())
    }

    /// Upserts the rotation for a month.
    ///
    /// An existing record for (year, month) keeps its key and is replaced;
    /// otherwise a new record is inserted. The record is stamped with the
    /// active team and an update timestamp, and a copy is written to the
    /// legacy store as a backup. Returns the record as stored.
    pub fn save_rotation(
        &self,
        year: i32,
        month: u32,
        assignments: Value,
    ) -> CoreResult<Value> {
        let team = self.current_team_id();
        let existing = self.get_rotation_by_month_year(year, month)?;

        let mut record = json!({
            "year": year,
            "month": month,
            "assignments": assignments,
            "teamId": team.as_u32(),
            "updatedAt": unix_millis(),
        });
        if let Some(id) = existing.as_ref().and_then(record_key) {
            record[rotadb_storage::KEY_FIELD] = Value::from(id);
        }

        let stored = self.save(schema::ROTATIONS, record)?;

        // Best-effort backup; the rotation itself is already committed.
        let backup_key = self.config().legacy_key(team, ROTATION_BACKUP_KEY);
        if let Err(e) = self.legacy().set(&backup_key, &stored.to_string()) {
            warn!(error = %e, "failed to write rotation backup");
        }

        Ok(stored)
    }

    /// Returns the team's configuration record.
    ///
    /// When none has been saved yet, a default is synthesized (not
    /// persisted) from the team id.
    pub fn get_team_config(&self) -> CoreResult<Value> {
        let team = self.current_team_id();
        if let Some(config) = self.get_by_id(schema::TEAM_CONFIG, schema::SINGLETON_KEY)? {
            return Ok(config);
        }

        Ok(json!({
            "id": schema::SINGLETON_KEY,
            "teamId": team.as_u32(),
            "name": format!("Team {}", team.as_u32() + 1),
            "color": default_team_color(team),
            "createdAt": unix_millis(),
        }))
    }

    /// Saves the team's configuration record, stamped with the active team
    /// and an update timestamp. Returns the record as stored.
    pub fn save_team_config(&self, config: Value) -> CoreResult<Value> {
        let team = self.current_team_id();
        let mut record = config;
        let Some(fields) = record.as_object_mut() else {
            return Err(StorageError::invalid_record("team config must be a JSON object").into());
        };

        fields.insert(
            rotadb_storage::KEY_FIELD.to_string(),
            Value::from(schema::SINGLETON_KEY),
        );
        fields.insert("teamId".to_string(), Value::from(team.as_u32()));
        fields.insert("updatedAt".to_string(), Value::from(unix_millis()));

        self.save(schema::TEAM_CONFIG, record)
    }
}
