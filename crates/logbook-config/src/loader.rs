use std::path::{Path, PathBuf};

use logbook_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::model::AppConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// `<data_dir>/config.yml`
    pub fn default_path() -> PathBuf {
        AppConfig::default_data_dir().join("config.yml")
    }

    /// Load configuration from `path` (or the default location), then apply
    /// `LOGBOOK_*` environment overrides. A `.env` file in the working
    /// directory is read first. A missing config file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("loaded environment from {}", env_file.display());
        }

        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = if path.exists() {
            let config = Self::load_file(&path)?;
            info!("loaded config from {}", path.display());
            config
        } else {
            debug!("no config file at {}, using defaults", path.display());
            AppConfig::default()
        };

        Self::apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(&contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!("unsupported config extension: {other}"))),
        }
    }

    /// Apply environment overrides looked up through `var`. Unparsable values
    /// are ignored with a warning.
    pub fn apply_overrides(config: &mut AppConfig, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("LOGBOOK_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = var("LOGBOOK_DB_PATH") {
            config.database.path = Some(PathBuf::from(path));
        }
        if let Some(value) = var("LOGBOOK_BACKUP_ENABLED") {
            match parse_bool(&value) {
                Some(enabled) => config.backup.enabled = enabled,
                None => warn!("ignoring LOGBOOK_BACKUP_ENABLED={value}: expected a boolean"),
            }
        }
        if let Some(value) = var("LOGBOOK_BACKUP_RETENTION") {
            match value.trim().parse() {
                Ok(retention) => config.backup.retention = retention,
                Err(_) => warn!("ignoring LOGBOOK_BACKUP_RETENTION={value}: expected a count"),
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn yaml_file_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "data_dir: /srv/logbook\ndatabase:\n  journal_mode: DELETE\nbackup:\n  retention: 3\n  required: true\n",
        )
        .unwrap();

        let config = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/logbook")));
        assert_eq!(config.database.journal_mode, "DELETE");
        assert_eq!(config.backup.retention, 3);
        assert!(config.backup.required);
        assert!(config.backup.enabled);
    }

    #[test]
    fn toml_file_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[database]\nmigrations_dir = \"/opt/bot/migrations\"\nlock_migrations = false\n",
        )
        .unwrap();

        let config = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(config.database.migrations_dir, PathBuf::from("/opt/bot/migrations"));
        assert!(!config.database.lock_migrations);
        assert_eq!(config.database.ledger_file, "000_migrations.sql");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(matches!(ConfigLoader::load_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::load(Some(&dir.path().join("absent.yml"))).unwrap();
        assert_eq!(config.database.journal_mode, "WAL");
        assert_eq!(config.database.ledger_file, "000_migrations.sql");
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LOGBOOK_DATA_DIR", "/data"),
            ("LOGBOOK_DB_PATH", "bot.db"),
            ("LOGBOOK_BACKUP_ENABLED", "off"),
            ("LOGBOOK_BACKUP_RETENTION", "4"),
        ]);
        let mut config = AppConfig::default();
        ConfigLoader::apply_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert!(!config.backup.enabled);
        assert_eq!(config.backup.retention, 4);
        assert_eq!(config.database_settings().path, PathBuf::from("/data/bot.db"));
    }

    #[test]
    fn bad_override_values_are_ignored() {
        let mut config = AppConfig::default();
        ConfigLoader::apply_overrides(&mut config, |k| match k {
            "LOGBOOK_BACKUP_ENABLED" => Some("maybe".into()),
            "LOGBOOK_BACKUP_RETENTION" => Some("-1".into()),
            _ => None,
        });
        assert!(config.backup.enabled);
        assert_eq!(config.backup.retention, 10);
    }
}
