use std::path::{Path, PathBuf};

pub const DEFAULT_LEDGER_FILE: &str = "000_migrations.sql";
pub const DEFAULT_BACKUP_RETENTION: usize = 10;
pub const DEFAULT_BACKUP_PREFIX: &str = "logbook";

/// Everything the storage layer needs to know about one database file.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub migrations_dir: PathBuf,
    pub schema_file: PathBuf,
    /// Migration-directory file that only sets up the ledger; never executed
    /// as a regular migration.
    pub ledger_file: String,
    pub journal_mode: String,
    /// After bootstrapping an empty database, record every available
    /// migration as applied since the schema file already reflects them.
    pub baseline_after_bootstrap: bool,
    pub lock_migrations: bool,
    pub backup: BackupSettings,
}

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub enabled: bool,
    /// Abort a migration run when its pre-migration backup fails.
    pub required: bool,
    pub dir: PathBuf,
    pub retention: usize,
    pub prefix: String,
}

impl DatabaseSettings {
    /// Settings rooted at `data_dir` with the stock layout.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            path: data_dir.join("logbook.db"),
            migrations_dir: data_dir.join("migrations"),
            schema_file: data_dir.join("schema").join("schema.sql"),
            ledger_file: DEFAULT_LEDGER_FILE.to_string(),
            journal_mode: "WAL".to_string(),
            baseline_after_bootstrap: true,
            lock_migrations: true,
            backup: BackupSettings {
                enabled: true,
                required: false,
                dir: data_dir.join("backups"),
                retention: DEFAULT_BACKUP_RETENTION,
                prefix: DEFAULT_BACKUP_PREFIX.to_string(),
            },
        }
    }
}
