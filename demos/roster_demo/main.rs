//! RotaDB walkthrough.
//!
//! Demonstrates the session layer end to end:
//! - Opening a team database (with migration on first open)
//! - CRUD through the façade
//! - Subscriptions reacting to mutations and team switches
//! - Saving and finding monthly rotations
//! - Copying data between teams
//!
//! Run with: cargo run -p roster_demo
//! Set RUST_LOG=debug to watch the manager work.

use rotadb_core::{schema, DatabaseManager, ManagerConfig, StorageBackend, TeamId};
use rotadb_storage::DirBackend;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::temp_dir().join("roster_demo");
    let backend: Arc<dyn StorageBackend> =
        Arc::new(DirBackend::open(&data_dir).expect("open data directory"));
    let manager = DatabaseManager::new(ManagerConfig::new(backend)).expect("create manager");

    // React to rotation changes without polling.
    let _sub = manager.subscribe(schema::ROTATIONS, |event| {
        println!(
            "  [notification] {} on {} ({})",
            event.action, event.store_name, event.team_id
        );
    });

    println!("== Team 0: seed roles and collaborators ==");
    manager
        .save_all(
            schema::ROLES,
            vec![
                json!({"name": "Operator", "certified": true}),
                json!({"name": "Reviewer", "certified": false}),
            ],
        )
        .expect("save roles");
    manager
        .save_all(
            schema::COLLABORATORS,
            vec![json!({"name": "Ana"}), json!({"name": "Bo"})],
        )
        .expect("save collaborators");

    println!("== Save the March 2025 rotation ==");
    let rotation = manager
        .save_rotation(2025, 3, json!({"Ana": "Operator", "Bo": "Reviewer"}))
        .expect("save rotation");
    println!("  stored rotation id: {}", rotation["id"]);

    let found = manager
        .get_rotation_by_month_year(2025, 3)
        .expect("lookup rotation")
        .expect("rotation exists");
    println!("  looked up by month/year: {}", found["assignments"]);

    println!("== Copy roles to team 1 ==");
    let copied =
        manager.copy_data_between_teams(TeamId::new(0), TeamId::new(1), &[schema::ROLES]);
    println!("  copy succeeded: {copied}");

    println!("== Switch to team 1 ==");
    manager.switch_team(TeamId::new(1)).expect("switch team");
    let roles = manager.get_all(schema::ROLES).expect("read roles");
    println!("  team 1 now has {} roles", roles.len());

    let config = manager.get_team_config().expect("team config");
    println!("  team config: {} ({})", config["name"], config["color"]);

    println!("== Storage stats ==");
    let stats = manager.storage_stats().expect("stats");
    for (store, usage) in &stats.stores {
        if usage.count > 0 {
            println!("  {store}: {} records, {} bytes", usage.count, usage.size_bytes);
        }
    }
    println!("  total: {} bytes for {}", stats.total_size, stats.team_id);
}
