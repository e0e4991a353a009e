//! File system capability handed to label scan stores.

use crate::error::{LabelScanError, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// The file system operations a store needs.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Creates `path` and any missing parents.
    fn mkdirs(&self, path: &Path) -> std::io::Result<()>;

    fn file_exists(&self, path: &Path) -> bool;

    /// Removes `path` and everything under it. Missing paths are not an error.
    fn delete_recursively(&self, path: &Path) -> std::io::Result<()>;

    /// Takes exclusive ownership of the directory at `path`.
    ///
    /// Fails with `DirectoryInUse` while another lease on the same directory
    /// is alive.
    fn lease(&self, path: &Path) -> Result<DirectoryLease>;
}

type LeaseTable = Arc<Mutex<HashSet<PathBuf>>>;

/// Exclusive ownership of an index directory. Released on drop.
pub struct DirectoryLease {
    path: PathBuf,
    table: LeaseTable,
}

impl DirectoryLease {
    /// Returns the leased directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for DirectoryLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryLease")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for DirectoryLease {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.remove(&self.path);
        tracing::debug!(path = %self.path.display(), "Released directory lease");
    }
}

/// The local disk.
///
/// Leases are tracked per `LocalFileSystem` value and its clones, so every
/// store in a process should share one instance.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    leases: LeaseTable,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileSystem for LocalFileSystem {
    fn mkdirs(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete_recursively(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_dir_all(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn lease(&self, path: &Path) -> Result<DirectoryLease> {
        // Canonical form so that `a/../a` and `a` collide
        let path = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => path.to_path_buf(),
            Err(e) => return Err(LabelScanError::Io(e)),
        };

        let mut table = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        if !table.insert(path.clone()) {
            return Err(LabelScanError::DirectoryInUse(path));
        }
        tracing::debug!(path = %path.display(), "Acquired directory lease");

        Ok(DirectoryLease {
            path,
            table: Arc::clone(&self.leases),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lease_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();

        let lease = fs.lease(temp_dir.path()).unwrap();
        let err = fs.lease(temp_dir.path()).unwrap_err();
        assert!(matches!(err, LabelScanError::DirectoryInUse(_)));

        drop(lease);
        assert!(fs.lease(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_lease_uses_canonical_path() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("label");
        let fs = LocalFileSystem::new();
        fs.mkdirs(&dir).unwrap();

        let _lease = fs.lease(&dir).unwrap();
        let aliased = dir.join("..").join("label");
        assert!(fs.lease(&aliased).is_err());
    }

    #[test]
    fn test_clones_share_leases() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();
        let other = fs.clone();

        let _lease = fs.lease(temp_dir.path()).unwrap();
        assert!(other.lease(temp_dir.path()).is_err());
    }

    #[test]
    fn test_mkdirs_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("schema").join("label").join("tantivy");
        let fs = LocalFileSystem::new();

        fs.mkdirs(&dir).unwrap();
        assert!(fs.file_exists(&dir));

        fs.delete_recursively(&temp_dir.path().join("schema")).unwrap();
        assert!(!fs.file_exists(&dir));
        fs.delete_recursively(&dir).unwrap();
    }
}
