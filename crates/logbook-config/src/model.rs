use std::path::{Path, PathBuf};

use logbook_db::settings::{
    BackupSettings, DEFAULT_BACKUP_PREFIX, DEFAULT_BACKUP_RETENTION, DEFAULT_LEDGER_FILE,
    DatabaseSettings,
};
use serde::{Deserialize, Serialize};

/// Top-level configuration. Relative paths are resolved against `data_dir`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Defaults to `<data_dir>/logbook.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,

    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,

    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,

    #[serde(default = "default_true")]
    pub baseline_after_bootstrap: bool,

    #[serde(default = "default_true")]
    pub lock_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Refuse to migrate when the pre-migration backup fails.
    #[serde(default)]
    pub required: bool,

    /// Defaults to `<data_dir>/backups`.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_retention")]
    pub retention: usize,

    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            migrations_dir: default_migrations_dir(),
            schema_file: default_schema_file(),
            ledger_file: default_ledger_file(),
            journal_mode: default_journal_mode(),
            baseline_after_bootstrap: true,
            lock_migrations: true,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            required: false,
            dir: None,
            retention: default_retention(),
            prefix: default_prefix(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("schema").join("schema.sql")
}

fn default_ledger_file() -> String {
    DEFAULT_LEDGER_FILE.to_string()
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retention() -> usize {
    DEFAULT_BACKUP_RETENTION
}

fn default_prefix() -> String {
    DEFAULT_BACKUP_PREFIX.to_string()
}

impl AppConfig {
    /// `~/.local/share/logbook` (or the platform equivalent), falling back to
    /// `./.logbook` when no data directory is known.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("logbook"))
            .unwrap_or_else(|| PathBuf::from(".logbook"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Self::default_data_dir)
    }

    /// Resolve this configuration into the settings consumed by the storage
    /// layer.
    pub fn database_settings(&self) -> DatabaseSettings {
        let data_dir = self.data_dir();
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                data_dir.join(p)
            }
        };

        DatabaseSettings {
            path: self
                .database
                .path
                .as_deref()
                .map(resolve)
                .unwrap_or_else(|| data_dir.join("logbook.db")),
            migrations_dir: resolve(&self.database.migrations_dir),
            schema_file: resolve(&self.database.schema_file),
            ledger_file: self.database.ledger_file.clone(),
            journal_mode: self.database.journal_mode.clone(),
            baseline_after_bootstrap: self.database.baseline_after_bootstrap,
            lock_migrations: self.database.lock_migrations,
            backup: BackupSettings {
                enabled: self.backup.enabled,
                required: self.backup.required,
                dir: self
                    .backup
                    .dir
                    .as_deref()
                    .map(resolve)
                    .unwrap_or_else(|| data_dir.join("backups")),
                retention: self.backup.retention,
                prefix: self.backup.prefix.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_layout() {
        let config = AppConfig {
            data_dir: Some(PathBuf::from("/srv/logbook")),
            ..Default::default()
        };
        let settings = config.database_settings();
        let stock = DatabaseSettings::new("/srv/logbook");

        assert_eq!(settings.path, stock.path);
        assert_eq!(settings.migrations_dir, stock.migrations_dir);
        assert_eq!(settings.schema_file, stock.schema_file);
        assert_eq!(settings.backup.dir, stock.backup.dir);
        assert_eq!(settings.backup.retention, 10);
        assert!(settings.backup.enabled);
        assert!(!settings.backup.required);
    }

    #[test]
    fn absolute_paths_are_kept() {
        let mut config = AppConfig {
            data_dir: Some(PathBuf::from("/srv/logbook")),
            ..Default::default()
        };
        config.database.migrations_dir = PathBuf::from("/opt/bot/migrations");
        config.backup.dir = Some(PathBuf::from("snapshots"));

        let settings = config.database_settings();
        assert_eq!(settings.migrations_dir, PathBuf::from("/opt/bot/migrations"));
        assert_eq!(settings.backup.dir, PathBuf::from("/srv/logbook/snapshots"));
    }
}
