//! Error types for the session layer.

use rotadb_storage::StorageError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for session-layer operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the session layer.
///
/// The type is `Clone` so a single failed open can be delivered to every
/// caller coalesced onto the same initialization attempt; the underlying
/// storage error is shared behind an `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[source] Arc<StorageError>),

    /// A migration data step failed.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a migration failure error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Returns the underlying storage error, if this is a storage error.
    #[must_use]
    pub fn as_storage(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(e) => Some(e),
            Self::MigrationFailed { .. } => None,
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        Self::Storage(Arc::new(e))
    }
}
