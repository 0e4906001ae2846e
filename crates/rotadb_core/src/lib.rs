//! # RotaDB Core
//!
//! Per-team persistence and session layer for RotaDB.
//!
//! Each team (tenant) owns a physically distinct database; the
//! [`DatabaseManager`] keeps exactly one of them open at a time, lazily
//! initializing it on first use and migrating its schema forward when the
//! on-disk version is behind. This crate provides:
//!
//! - The connection manager with its coalescing initialization guard:
//!   concurrent `init` calls collapse onto one physical open
//! - The schema registry declaring the fixed set of stores and indexes
//! - Forward-only migration with one-time legacy import and singleton
//!   seeding
//! - A notification bus so collaborators react to mutations and team
//!   switches without polling
//! - The CRUD façade plus rotation/team-config helpers and usage stats
//! - The tenant switch protocol, including cross-team copy and
//!   destroy-and-rebuild
//!
//! ## Example
//!
//! ```rust
//! use rotadb_core::{schema, DatabaseManager, ManagerConfig, TeamId};
//! use serde_json::json;
//!
//! let manager = DatabaseManager::new(ManagerConfig::default()).unwrap();
//!
//! let _sub = manager.subscribe(schema::ROTATIONS, |event| {
//!     println!("{} on {}", event.action, event.store_name);
//! });
//!
//! manager.save_rotation(2025, 3, json!({"Ana": "Operator"})).unwrap();
//! manager.switch_team(TeamId::new(1)).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod facade;
mod manager;
mod migration;
mod notify;
mod rotation;
pub mod schema;
mod stats;
mod teams;
mod types;

pub use config::ManagerConfig;
pub use error::{CoreError, CoreResult};
pub use manager::{shared, DatabaseManager};
pub use notify::{ChangeAction, ChangeEvent, NotificationBus, Subscription};
pub use stats::{StorageUsage, StoreUsage};
pub use types::TeamId;

// Storage-layer types callers need to configure a manager or inspect
// records.
pub use rotadb_storage::{
    record_key, Database, DirBackend, MemoryBackend, RecordKey, StorageBackend, StorageError,
};
