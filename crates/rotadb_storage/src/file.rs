//! Directory-backed storage backend.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/
//! ├─ LOCK               # Advisory lock for single-process access
//! ├─ <name>.json        # One snapshot file per blob
//! └─ <name>.json.tmp    # Transient, only during an atomic write
//! ```
//!
//! The LOCK file ensures only one process works against the directory at a
//! time. Snapshots are written to a temp file and renamed into place so a
//! crash never leaves a torn blob.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const BLOB_EXT: &str = "json";

/// A storage backend keeping one snapshot file per blob under a locked
/// directory.
///
/// # Example
///
/// ```rust,ignore
/// use rotadb_storage::DirBackend;
/// use std::path::Path;
///
/// let backend = DirBackend::open(Path::new("app_data"))?;
/// ```
#[derive(Debug)]
pub struct DirBackend {
    /// Root directory path.
    root: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl DirBackend {
    /// Opens or creates the backend directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the lock,
    /// or an I/O error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;

        let lock_path = root.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the backend's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{BLOB_EXT}"))
    }
}

impl StorageBackend for DirBackend {
    fn load(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(name);
        let tmp = path.with_extension(format!("{BLOB_EXT}.tmp"));

        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        match fs::remove_file(self.blob_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.blob_path(name).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dir_store_and_load() {
        let temp = tempdir().unwrap();
        let backend = DirBackend::open(temp.path()).unwrap();

        backend.store("db", b"snapshot").unwrap();
        assert_eq!(backend.load("db").unwrap(), Some(b"snapshot".to_vec()));
    }

    #[test]
    fn dir_load_missing_returns_none() {
        let temp = tempdir().unwrap();
        let backend = DirBackend::open(temp.path()).unwrap();
        assert_eq!(backend.load("missing").unwrap(), None);
    }

    #[test]
    fn dir_store_replaces_atomically() {
        let temp = tempdir().unwrap();
        let backend = DirBackend::open(temp.path()).unwrap();

        backend.store("db", b"old").unwrap();
        backend.store("db", b"new").unwrap();

        assert_eq!(backend.load("db").unwrap(), Some(b"new".to_vec()));
        // No temp file left behind.
        assert!(!temp.path().join("db.json.tmp").exists());
    }

    #[test]
    fn dir_remove() {
        let temp = tempdir().unwrap();
        let backend = DirBackend::open(temp.path()).unwrap();

        backend.store("db", b"data").unwrap();
        backend.remove("db").unwrap();
        assert!(!backend.exists("db").unwrap());

        // Removing an absent blob succeeds.
        backend.remove("db").unwrap();
    }

    #[test]
    fn dir_second_open_is_locked() {
        let temp = tempdir().unwrap();
        let _backend = DirBackend::open(temp.path()).unwrap();

        let second = DirBackend::open(temp.path());
        assert!(matches!(second, Err(StorageError::Locked)));
    }

    #[test]
    fn dir_persists_across_reopen() {
        let temp = tempdir().unwrap();
        {
            let backend = DirBackend::open(temp.path()).unwrap();
            backend.store("db", b"kept").unwrap();
        }
        let backend = DirBackend::open(temp.path()).unwrap();
        assert_eq!(backend.load("db").unwrap(), Some(b"kept".to_vec()));
    }
}
