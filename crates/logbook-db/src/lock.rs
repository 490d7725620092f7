use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Exclusive advisory lock held for the duration of a migration run, so two
/// processes (or two handles in one process) never migrate the same file at
/// once. Released on drop.
pub struct MigrationLock {
    file: File,
    path: PathBuf,
}

impl MigrationLock {
    /// Lock file path used for the database at `db_path`.
    pub fn lock_path(db_path: &Path) -> PathBuf {
        let mut name = db_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".migrate.lock");
        db_path.with_file_name(name)
    }

    /// Block until the lock for `db_path` is acquired.
    pub fn acquire(db_path: &Path) -> DbResult<Self> {
        let file = Self::open(db_path)?;
        let path = Self::lock_path(db_path);
        if file.try_lock_exclusive().is_err() {
            debug!("waiting for migration lock {}", path.display());
            file.lock_exclusive()
                .map_err(|e| DbError::Lock(format!("failed to lock {}: {e}", path.display())))?;
        }
        debug!("acquired migration lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Acquire the lock only if nobody else holds it.
    pub fn try_acquire(db_path: &Path) -> DbResult<Option<Self>> {
        let file = Self::open(db_path)?;
        let path = Self::lock_path(db_path);
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(_) => Ok(None),
        }
    }

    fn open(db_path: &Path) -> DbResult<File> {
        let path = Self::lock_path(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| DbError::Lock(format!("failed to open {}: {e}", path.display())))
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("failed to release migration lock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_path_sits_next_to_database() {
        let path = MigrationLock::lock_path(Path::new("/data/logbook.db"));
        assert_eq!(path, PathBuf::from("/data/logbook.db.migrate.lock"));
    }

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("logbook.db");

        let held = MigrationLock::acquire(&db_path).unwrap();
        assert!(MigrationLock::try_acquire(&db_path).unwrap().is_none());

        drop(held);
        assert!(MigrationLock::try_acquire(&db_path).unwrap().is_some());
    }
}
