//! Point-in-time copies of the live database.
//!
//! Backups are written with SQLite's online backup API. When that fails the
//! live file is checkpointed and copied byte for byte instead. File names
//! carry the creation time and reason:
//! `<prefix>_backup_<timestamp>_<reason>.db`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, DatabaseName, OpenFlags};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::settings::BackupSettings;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub reason: String,
}

impl BackupArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Format size for human display
    pub fn size_display(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.size_bytes >= GB {
            format!("{:.1} GB", self.size_bytes as f64 / GB as f64)
        } else if self.size_bytes >= MB {
            format!("{:.1} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.1} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}

pub struct BackupManager {
    db: Arc<ConnectionManager>,
    settings: BackupSettings,
}

impl BackupManager {
    pub fn new(db: Arc<ConnectionManager>, settings: BackupSettings) -> Self {
        Self { db, settings }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.settings.dir
    }

    fn name_prefix(&self) -> String {
        format!("{}_backup_", self.settings.prefix)
    }

    /// Write a new backup tagged with `reason`, then prune down to the
    /// configured retention.
    pub fn create_backup(&self, reason: &str) -> DbResult<BackupArtifact> {
        validate_reason(reason)?;
        if let Err(e) = std::fs::create_dir_all(&self.settings.dir) {
            warn!(
                "failed to create backup directory {}: {e}",
                self.settings.dir.display()
            );
        }

        let path = self.next_backup_path(reason);
        match self
            .db
            .with_connection(|conn| Ok(conn.backup(DatabaseName::Main, &path, None)?))
        {
            Ok(()) => debug!("native backup written to {}", path.display()),
            Err(e) => {
                warn!("native backup failed, falling back to file copy: {e}");
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!("no partial backup to remove at {}: {e}", path.display());
                }
                self.copy_live_file(&path)?;
            }
        }

        let artifact = artifact_for(&path, &self.name_prefix())
            .ok_or_else(|| DbError::Backup(format!("backup not found after write: {}", path.display())))?;
        info!(
            "created {} backup {} ({})",
            reason,
            artifact.file_name(),
            artifact.size_display()
        );

        if let Err(e) = self.prune_backups(self.settings.retention) {
            warn!("failed to prune old backups: {e}");
        }
        Ok(artifact)
    }

    fn next_backup_path(&self, reason: &str) -> PathBuf {
        let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let mut path = self
            .settings
            .dir
            .join(format!("{}{stamp}_{reason}.db", self.name_prefix()));
        let mut n = 1;
        while path.exists() {
            path = self
                .settings
                .dir
                .join(format!("{}{stamp}-{n}_{reason}.db", self.name_prefix()));
            n += 1;
        }
        path
    }

    fn copy_live_file(&self, dest: &Path) -> DbResult<()> {
        // Fold the WAL into the main file so the copy is complete.
        let checkpoint = self
            .db
            .with_connection(|conn| Ok(conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?));
        if let Err(e) = checkpoint {
            debug!("skipping WAL checkpoint before copy: {e}");
        }

        std::fs::copy(self.db.path(), dest).map_err(|e| {
            DbError::Backup(format!(
                "failed to copy {} to {}: {e}",
                self.db.path().display(),
                dest.display()
            ))
        })?;
        Ok(())
    }

    /// Whether `path` is a non-empty file SQLite can read a catalog from.
    pub fn validate_backup(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            _ => {
                debug!("backup {} is missing or empty", path.display());
                return false;
            }
        }

        let check = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).and_then(
            |conn| conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0)),
        );
        match check {
            Ok(_) => true,
            Err(e) => {
                debug!("backup {} failed validation: {e}", path.display());
                false
            }
        }
    }

    /// Replace the live database with `path`.
    ///
    /// The current state is saved as a `pre_restore` backup first and the
    /// live connection is closed. Reconnecting is up to the caller, through
    /// the registry.
    pub fn restore_from_backup(&self, path: &Path) -> DbResult<()> {
        if !self.validate_backup(path) {
            return Err(DbError::Restore(format!(
                "not a valid backup: {}",
                path.display()
            )));
        }

        let live = self.db.path().to_path_buf();
        // Staged next to the live file, so pruning cannot remove the source
        // and the final swap is a rename.
        let staging = sidecar(&live, "-restore");
        std::fs::copy(path, &staging).map_err(|e| {
            DbError::Restore(format!("failed to stage {}: {e}", path.display()))
        })?;

        let result = self.swap_in(&live, &staging);
        if result.is_err()
            && let Err(e) = std::fs::remove_file(&staging)
        {
            warn!("failed to remove staged restore {}: {e}", staging.display());
        }
        result?;

        info!("restored {} from {}", live.display(), path.display());
        Ok(())
    }

    fn swap_in(&self, live: &Path, staging: &Path) -> DbResult<()> {
        if live.exists() {
            self.create_backup("pre_restore")
                .map_err(|e| DbError::Restore(format!("pre-restore backup failed: {e}")))?;
        }

        self.db
            .close()
            .map_err(|e| DbError::Restore(format!("failed to close live database: {e}")))?;

        for suffix in ["-wal", "-shm"] {
            let stale = sidecar(live, suffix);
            if stale.exists() {
                std::fs::remove_file(&stale).map_err(|e| {
                    DbError::Restore(format!("failed to remove {}: {e}", stale.display()))
                })?;
            }
        }

        std::fs::rename(staging, live).map_err(|e| {
            DbError::Restore(format!("failed to replace {}: {e}", live.display()))
        })
    }

    /// Backups in the backup directory, newest first.
    pub fn get_backup_list(&self) -> DbResult<Vec<BackupArtifact>> {
        let mut backups: Vec<BackupArtifact> = self
            .backup_files()?
            .into_iter()
            .filter_map(|(path, _)| artifact_for(&path, &self.name_prefix()))
            .collect();
        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.path.cmp(&a.path))
        });
        Ok(backups)
    }

    /// Delete the oldest backups (by modification time) until at most `keep`
    /// remain. Returns how many were removed.
    pub fn prune_backups(&self, keep: usize) -> DbResult<usize> {
        let mut files = self.backup_files()?;
        if files.len() <= keep {
            return Ok(0);
        }

        files.sort_by(|(a_path, a_time), (b_path, b_time)| {
            a_time.cmp(b_time).then_with(|| a_path.cmp(b_path))
        });

        let mut removed = 0;
        for (path, _) in files.iter().take(files.len() - keep) {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    info!("pruned old backup {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("failed to remove old backup {}: {e}", path.display()),
            }
        }
        Ok(removed)
    }

    fn backup_files(&self) -> DbResult<Vec<(PathBuf, SystemTime)>> {
        let dir = &self.settings.dir;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = self.name_prefix();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".db") {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_file() {
                files.push((entry.path(), meta.modified()?));
            }
        }
        Ok(files)
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Reasons end up in file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_reason(reason: &str) -> DbResult<()> {
    let valid = !reason.is_empty()
        && reason
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DbError::Backup(format!(
            "invalid backup reason {reason:?}: use letters, digits, '_' or '-'"
        )))
    }
}

/// Build the artifact for a backup file, reading the creation time and
/// reason from its name. Falls back to the modification time when the name
/// carries no parsable timestamp.
fn artifact_for(path: &Path, prefix: &str) -> Option<BackupArtifact> {
    let meta = std::fs::metadata(path).ok()?;
    let name = path.file_name()?.to_str()?;
    let body = name.strip_prefix(prefix)?.strip_suffix(".db")?;
    let (stamp, reason) = body.split_once('_').unwrap_or((body, ""));

    let created_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
        .unwrap_or_else(Utc::now);

    Some(BackupArtifact {
        path: path.to_path_buf(),
        created_at,
        size_bytes: meta.len(),
        reason: reason.to_string(),
    })
}
