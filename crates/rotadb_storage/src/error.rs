//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A persisted database or legacy payload could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the backend's exclusive lock.
    #[error("storage locked: another process has exclusive access")]
    Locked,

    /// The database handle has been closed.
    #[error("database is closed")]
    Closed,

    /// The on-disk schema version is newer than the version requested at
    /// open time. Downgrades are unsupported.
    #[error("database version {on_disk} is newer than requested version {requested}")]
    VersionTooNew {
        /// The version found on disk.
        on_disk: u32,
        /// The version requested by the caller.
        requested: u32,
    },

    /// The named store is not declared in this database.
    #[error("unknown store: {name}")]
    UnknownStore {
        /// Name of the store.
        name: String,
    },

    /// The named index does not exist on the store.
    #[error("unknown index {index} on store {store}")]
    UnknownIndex {
        /// Store the index was looked up on.
        store: String,
        /// Name of the index.
        index: String,
    },

    /// A write required an explicit primary key but the record carried none
    /// and the store does not auto-assign keys.
    #[error("store {store} requires an explicit key")]
    KeyRequired {
        /// Name of the store.
        store: String,
    },

    /// An insert collided with an existing primary key.
    #[error("duplicate key {key} in store {store}")]
    DuplicateKey {
        /// Name of the store.
        store: String,
        /// The colliding key.
        key: u64,
    },

    /// The record is not usable with the store's key policy.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }

    /// Creates an unknown store error.
    pub fn unknown_store(name: impl Into<String>) -> Self {
        Self::UnknownStore { name: name.into() }
    }
}
