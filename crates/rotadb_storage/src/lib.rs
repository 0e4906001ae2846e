//! # RotaDB Storage
//!
//! Transactional key-value engine and storage backends for RotaDB.
//!
//! This crate provides the storage layer that the RotaDB session layer sits
//! on top of. It is deliberately engine-shaped rather than application-shaped:
//!
//! - [`StorageBackend`] - named-blob persistence (memory or directory)
//! - [`StoreEngine`] - opens physical databases addressed by
//!   (name, schema version), running an upgrade hook when the on-disk
//!   version is behind
//! - [`Database`] - an open handle exposing named stores, per-store
//!   transactions, and secondary-index reads
//! - [`LegacyKv`] - a flat string-keyed store kept only as a one-time
//!   migration source and backup target
//!
//! ## Design Principles
//!
//! - Records are JSON documents keyed by a `u64` primary key in their `id`
//!   field; `put` is an explicit insert-or-replace-by-primary-key contract
//! - Stores are additive: once declared they are never dropped by an upgrade
//! - A database whose on-disk version is *above* the requested version is
//!   refused, never silently truncated
//! - Transactions are atomic per store: either every buffered operation
//!   commits and is persisted, or none is
//!
//! ## Example
//!
//! ```rust
//! use rotadb_storage::{KeyPolicy, MemoryBackend, StoreEngine, StoreSpec};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! const USERS: StoreSpec = StoreSpec {
//!     name: "users",
//!     key: KeyPolicy::AutoIncrement,
//!     indexes: &[],
//! };
//!
//! let engine = StoreEngine::new(Arc::new(MemoryBackend::new()));
//! let db = engine
//!     .open("app_db", 1, |ctx, _old, _new| {
//!         ctx.create_store(&USERS);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let key = db
//!     .transact("users", |txn| txn.add(json!({"name": "Alice"})))
//!     .unwrap();
//! assert_eq!(key, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod database;
mod engine;
mod error;
mod file;
mod legacy;
mod memory;
mod transaction;
mod types;

pub use backend::StorageBackend;
pub use database::Database;
pub use engine::{StoreEngine, UpgradeContext};
pub use error::{StorageError, StorageResult};
pub use file::DirBackend;
pub use legacy::LegacyKv;
pub use memory::MemoryBackend;
pub use transaction::StoreTxn;
pub use types::{record_key, IndexSpec, KeyPolicy, RecordKey, StoreSpec, KEY_FIELD};
