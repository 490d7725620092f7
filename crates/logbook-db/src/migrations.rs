//! Migration system for tracking and applying database schema changes.
//!
//! Each migration is a `<version>_<description>.sql` file in the migrations
//! directory. Files are applied in file-name order and tracked in the
//! `schema_migrations` ledger. A migration counts as applied only when its
//! ledger row has `success = 1`; failed attempts stay pending.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::backup::BackupManager;
use crate::connection::{ConnectionManager, Executor};
use crate::error::{DbError, DbResult};
use crate::lock::MigrationLock;
use crate::policy::{MIGRATION_POLICY, Recovery, recovery_for};
use crate::settings::DatabaseSettings;
use crate::sql_parser::SqlStatementParser;

pub const LEDGER_TABLE: &str = "schema_migrations";

const LEDGER_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    execution_time_ms INTEGER NOT NULL DEFAULT 0,
    success INTEGER NOT NULL DEFAULT 0 CHECK (success IN (0, 1)),
    error_message TEXT,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// A migration script discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    pub filename: String,
    /// Everything before the first `_` in the file name.
    pub version: String,
    pub description: String,
    pub path: PathBuf,
}

impl MigrationFile {
    pub fn from_path(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        let stem = path.file_stem()?.to_str()?;
        let (version, description) = match stem.split_once('_') {
            Some((version, rest)) => (version, rest.replace('_', " ")),
            None => (stem, stem.to_string()),
        };

        Some(Self {
            version: version.to_string(),
            description,
            filename,
            path: path.to_path_buf(),
        })
    }

    pub fn read_sql(&self) -> DbResult<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

/// One row of the migration ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: String,
    pub description: String,
    pub execution_time_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub available: usize,
    pub executed: usize,
    pub pending: usize,
    pub pending_migrations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a `run_migrations` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationRunReport {
    /// File names applied by this run, in order.
    pub applied: Vec<String>,
    pub already_applied: usize,
    /// Pre-migration backup, when one was taken.
    pub backup: Option<PathBuf>,
}

/// Per-script execution counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatementReport {
    pub executed: usize,
    /// Statements whose error matched the tolerance policy.
    pub tolerated: usize,
}

pub struct MigrationManager {
    db: Arc<ConnectionManager>,
    settings: DatabaseSettings,
}

impl MigrationManager {
    pub fn new(db: Arc<ConnectionManager>, settings: DatabaseSettings) -> Self {
        Self { db, settings }
    }

    /// Create the ledger table unless the catalog already lists it.
    pub fn initialize(&self) -> DbResult<()> {
        self.db.with_connection(|conn| {
            let exists: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [LEDGER_TABLE],
                    |row| row.get(0),
                )
                .map_err(DbError::LedgerInit)?;
            if exists > 0 {
                debug!("migration ledger already present");
                return Ok(());
            }

            conn.execute_batch(LEDGER_SCHEMA_SQL)
                .map_err(DbError::LedgerInit)?;
            info!("created migration ledger table {LEDGER_TABLE}");
            Ok(())
        })
    }

    /// Migration files in the migrations directory, sorted by file name. The
    /// ledger setup file is never listed. A missing directory means no
    /// migrations.
    pub fn get_available_migrations(&self) -> DbResult<Vec<MigrationFile>> {
        let dir = &self.settings.migrations_dir;
        if !dir.is_dir() {
            debug!("migrations directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_sql = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("sql"));
            if !path.is_file() || !is_sql {
                continue;
            }
            let Some(file) = MigrationFile::from_path(&path) else {
                warn!("skipping migration with non UTF-8 name: {}", path.display());
                continue;
            };
            if file.filename == self.settings.ledger_file {
                continue;
            }
            files.push(file);
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /// Versions recorded as successfully applied. Empty when the ledger does
    /// not exist yet.
    pub fn get_executed_migrations(&self) -> DbResult<HashSet<String>> {
        if !self.db.table_exists(LEDGER_TABLE)? {
            return Ok(HashSet::new());
        }

        let versions = self.db.all(
            "SELECT version FROM schema_migrations WHERE success = 1",
            [],
            |row| row.get::<_, String>(0),
        )?;
        Ok(versions.into_iter().collect())
    }

    /// Every ledger row, failed attempts included, ordered by version.
    pub fn get_migration_history(&self) -> DbResult<Vec<MigrationRecord>> {
        if !self.db.table_exists(LEDGER_TABLE)? {
            return Ok(Vec::new());
        }

        self.db.all(
            "SELECT version, description, execution_time_ms, success, error_message, applied_at
             FROM schema_migrations
             ORDER BY version",
            [],
            |row| {
                Ok(MigrationRecord {
                    version: row.get(0)?,
                    description: row.get(1)?,
                    execution_time_ms: row.get(2)?,
                    success: row.get::<_, i64>(3)? == 1,
                    error_message: row.get(4)?,
                    applied_at: parse_datetime(row.get::<_, String>(5)?),
                })
            },
        )
    }

    /// Apply every pending migration in file-name order, stopping at the
    /// first failure. Takes a pre-migration backup first when backups are
    /// enabled and something is pending.
    pub fn run_migrations(&self) -> DbResult<MigrationRunReport> {
        let _lock = if self.settings.lock_migrations {
            Some(MigrationLock::acquire(self.db.path())?)
        } else {
            None
        };

        self.initialize()?;
        let available = self.get_available_migrations()?;
        let executed = self.get_executed_migrations()?;
        let pending: Vec<&MigrationFile> = available
            .iter()
            .filter(|m| !executed.contains(&m.version))
            .collect();

        let mut report = MigrationRunReport {
            already_applied: available.len() - pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            info!("database schema is up to date ({} migrations)", available.len());
            return Ok(report);
        }

        info!("{} pending migration(s)", pending.len());
        if self.settings.backup.enabled {
            report.backup = self.pre_migration_backup()?;
        }

        for file in pending {
            self.execute_migration(file)
                .map_err(|e| DbError::MigrationRun {
                    version: file.version.clone(),
                    source: Box::new(e),
                })?;
            report.applied.push(file.filename.clone());
        }

        info!("applied {} migration(s)", report.applied.len());
        Ok(report)
    }

    fn pre_migration_backup(&self) -> DbResult<Option<PathBuf>> {
        let backups = BackupManager::new(Arc::clone(&self.db), self.settings.backup.clone());
        match backups.create_backup("pre_migration") {
            Ok(artifact) => Ok(Some(artifact.path)),
            Err(e) if self.settings.backup.required => Err(e),
            Err(e) => {
                warn!("pre-migration backup failed, continuing without it: {e}");
                Ok(None)
            }
        }
    }

    /// Run one migration and record the outcome in the ledger, success or
    /// not. The success row is written inside the migration's transaction,
    /// so a migration is committed together with its ledger entry or not at
    /// all. A failure is recorded after the rollback.
    pub fn execute_migration(&self, file: &MigrationFile) -> DbResult<MigrationRecord> {
        info!("applying migration {}", file.filename);
        let started = Instant::now();
        let mut record = MigrationRecord {
            version: file.version.clone(),
            description: file.description.clone(),
            execution_time_ms: 0,
            success: true,
            error_message: None,
            applied_at: Utc::now(),
        };

        let outcome = file.read_sql().and_then(|sql| {
            let statements = SqlStatementParser::parse(&sql);
            self.db.transaction(|tx| {
                let stats = apply_statements(tx, &statements)?;
                let committed = MigrationRecord {
                    execution_time_ms: started.elapsed().as_millis() as i64,
                    ..record.clone()
                };
                write_record(tx, &committed)?;
                Ok((stats, committed))
            })
        });

        match outcome {
            Ok((stats, committed)) => {
                info!(
                    "migration {} applied in {}ms ({} statements, {} already applied)",
                    file.version, committed.execution_time_ms, stats.executed, stats.tolerated
                );
                Ok(committed)
            }
            Err(e) => {
                record.execution_time_ms = started.elapsed().as_millis() as i64;
                record.success = false;
                record.error_message = Some(e.to_string());
                if let Err(record_err) = self.db.transaction(|tx| write_record(tx, &record)) {
                    error!("failed to record failed migration {}: {record_err}", file.version);
                }
                error!("migration {} failed: {e}", file.version);
                Err(e)
            }
        }
    }

    /// Execute a multi-statement script inside one transaction. An
    /// `ADD COLUMN` hitting an existing column is skipped; any other error
    /// rolls everything back and reports the failing statement.
    pub fn execute_multiple_statements_with_transaction(
        &self,
        sql: &str,
    ) -> DbResult<StatementReport> {
        let statements = SqlStatementParser::parse(sql);
        self.db.transaction(|tx| apply_statements(tx, &statements))
    }

    /// Counts of available, executed and pending migrations. Never fails;
    /// problems are reported through `error` with zeroed counts.
    pub fn get_migration_status(&self) -> MigrationStatus {
        match self.try_migration_status() {
            Ok(status) => status,
            Err(e) => {
                warn!("failed to compute migration status: {e}");
                MigrationStatus {
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    fn try_migration_status(&self) -> DbResult<MigrationStatus> {
        let available = self.get_available_migrations()?;
        let executed = self.get_executed_migrations()?;
        let pending_migrations: Vec<String> = available
            .iter()
            .filter(|m| !executed.contains(&m.version))
            .map(|m| m.filename.clone())
            .collect();

        Ok(MigrationStatus {
            available: available.len(),
            executed: available.len() - pending_migrations.len(),
            pending: pending_migrations.len(),
            pending_migrations,
            error: None,
        })
    }

    /// Mark every available migration as applied without running it. Used
    /// right after a bootstrap, whose schema file already contains them.
    pub(crate) fn record_baseline(&self) -> DbResult<usize> {
        self.initialize()?;
        let executed = self.get_executed_migrations()?;
        let baseline: Vec<MigrationFile> = self
            .get_available_migrations()?
            .into_iter()
            .filter(|m| !executed.contains(&m.version))
            .collect();

        self.db.transaction(|tx| {
            for file in &baseline {
                tx.run(
                    "INSERT OR REPLACE INTO schema_migrations
                         (version, description, execution_time_ms, success, error_message)
                     VALUES (?1, ?2, 0, 1, NULL)",
                    params![file.version, file.description],
                )?;
            }
            Ok(())
        })?;

        if !baseline.is_empty() {
            info!("recorded {} migration(s) as baseline", baseline.len());
        }
        Ok(baseline.len())
    }
}

/// Run `statements` in order on `tx`, skipping those whose error the
/// migration policy tolerates.
fn apply_statements(tx: &Executor<'_>, statements: &[String]) -> DbResult<StatementReport> {
    let total = statements.len();
    let mut report = StatementReport::default();
    for (i, statement) in statements.iter().enumerate() {
        let Err(source) = tx.execute_batch(statement) else {
            report.executed += 1;
            continue;
        };

        let kind = SqlStatementParser::classify(statement);
        match recovery_for(MIGRATION_POLICY, kind, &source) {
            Some(Recovery::SkipAsApplied) => {
                info!("statement {}/{} already applied, skipping: {source}", i + 1, total);
                report.tolerated += 1;
            }
            None => {
                return Err(DbError::Statement {
                    index: i + 1,
                    total,
                    statement: statement.clone(),
                    source,
                });
            }
        }
    }
    Ok(report)
}

fn write_record(tx: &Executor<'_>, record: &MigrationRecord) -> DbResult<()> {
    tx.run(
        "INSERT OR REPLACE INTO schema_migrations
             (version, description, execution_time_ms, success, error_message, applied_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.version,
            record.description,
            record.execution_time_ms,
            record.success as i64,
            record.error_message,
            record.applied_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionRegistry;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _dir: TempDir,
        db: Arc<ConnectionManager>,
        settings: DatabaseSettings,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let mut settings = DatabaseSettings::new(dir.path());
            settings.backup.enabled = false;
            std::fs::create_dir_all(&settings.migrations_dir).unwrap();

            let registry = ConnectionRegistry::new();
            let db = registry.get_or_create(&settings.path).unwrap();
            db.connect(&settings.journal_mode).unwrap();
            db.run(
                "CREATE TABLE activities (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
                [],
            )
            .unwrap();

            Self {
                _dir: dir,
                db,
                settings,
            }
        }

        fn write(&self, name: &str, sql: &str) {
            std::fs::write(self.settings.migrations_dir.join(name), sql).unwrap();
        }

        fn manager(&self) -> MigrationManager {
            MigrationManager::new(Arc::clone(&self.db), self.settings.clone())
        }

        fn columns(&self, table: &str) -> Vec<String> {
            self.db
                .all(&format!("PRAGMA table_info({table})"), [], |row| row.get(1))
                .unwrap()
        }
    }

    #[test]
    fn parses_version_and_description_from_file_name() {
        let file = MigrationFile::from_path(Path::new("/m/002_add_todo_tags.sql")).unwrap();
        assert_eq!(file.filename, "002_add_todo_tags.sql");
        assert_eq!(file.version, "002");
        assert_eq!(file.description, "add todo tags");

        let bare = MigrationFile::from_path(Path::new("/m/003.sql")).unwrap();
        assert_eq!(bare.version, "003");
    }

    #[test]
    fn discovery_sorts_filters_and_skips_ledger_file() {
        let fx = Fixture::new();
        fx.write("002_b.sql", "SELECT 1;");
        fx.write("001_a.sql", "SELECT 1;");
        fx.write("000_migrations.sql", "SELECT 1;");
        fx.write("README.md", "not sql");
        std::fs::create_dir(fx.settings.migrations_dir.join("010_dir.sql")).unwrap();

        let names: Vec<String> = fx
            .manager()
            .get_available_migrations()
            .unwrap()
            .into_iter()
            .map(|m| m.filename)
            .collect();
        assert_eq!(names, vec!["001_a.sql", "002_b.sql"]);
    }

    #[test]
    fn missing_directory_means_no_migrations() {
        let fx = Fixture::new();
        let mut settings = fx.settings.clone();
        settings.migrations_dir = settings.migrations_dir.join("nope");
        let manager = MigrationManager::new(Arc::clone(&fx.db), settings);
        assert!(manager.get_available_migrations().unwrap().is_empty());
    }

    #[test]
    fn executed_is_empty_before_ledger_exists() {
        let fx = Fixture::new();
        let manager = fx.manager();
        assert!(manager.get_executed_migrations().unwrap().is_empty());
        assert!(manager.get_migration_history().unwrap().is_empty());

        manager.initialize().unwrap();
        manager.initialize().unwrap();
        assert!(fx.db.table_exists(LEDGER_TABLE).unwrap());
    }

    #[test]
    fn runs_pending_migrations_in_order() {
        let fx = Fixture::new();
        fx.write("001_add_category.sql", "ALTER TABLE activities ADD COLUMN category TEXT;");
        fx.write(
            "002_index_category.sql",
            "CREATE INDEX idx_activities_category ON activities(category);",
        );
        let manager = fx.manager();

        let report = manager.run_migrations().unwrap();
        assert_eq!(report.applied, vec!["001_add_category.sql", "002_index_category.sql"]);
        assert_eq!(report.already_applied, 0);
        assert!(report.backup.is_none());

        let status = manager.get_migration_status();
        assert_eq!(status.pending, 0);
        assert_eq!(status.executed, status.available);
        assert!(status.error.is_none());

        let again = manager.run_migrations().unwrap();
        assert!(again.applied.is_empty());
        assert_eq!(again.already_applied, 2);
    }

    #[test]
    fn failure_stops_the_run_and_stays_pending() {
        let fx = Fixture::new();
        fx.write("001_ok.sql", "ALTER TABLE activities ADD COLUMN category TEXT;");
        fx.write("002_broken.sql", "ALTER TABLE nowhere ADD COLUMN x TEXT;");
        fx.write("003_later.sql", "ALTER TABLE activities ADD COLUMN later TEXT;");
        let manager = fx.manager();

        let err = manager.run_migrations().unwrap_err();
        assert!(matches!(err, DbError::MigrationRun { ref version, .. } if version == "002"));

        assert!(fx.columns("activities").contains(&"category".to_string()));
        assert!(!fx.columns("activities").contains(&"later".to_string()));

        let status = manager.get_migration_status();
        assert_eq!(status.executed, 1);
        assert_eq!(status.pending_migrations, vec!["002_broken.sql", "003_later.sql"]);

        let history = manager.get_migration_history().unwrap();
        let failed = history.iter().find(|r| r.version == "002").unwrap();
        assert!(!failed.success);
        assert!(failed.error_message.as_deref().unwrap().contains("no such table"));
        assert!(history.iter().all(|r| r.version != "003"));

        // Fixing the script lets the next run pick up where it stopped, and
        // the ledger row is overwritten rather than duplicated.
        fx.write("002_broken.sql", "CREATE TABLE nowhere (id INTEGER);");
        let report = manager.run_migrations().unwrap();
        assert_eq!(report.applied, vec!["002_broken.sql", "003_later.sql"]);

        let history = manager.get_migration_history().unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|r| r.success && r.error_message.is_none()));
    }

    #[test]
    fn add_column_twice_is_idempotent() {
        let fx = Fixture::new();
        let manager = fx.manager();
        let sql = "ALTER TABLE activities ADD COLUMN mood TEXT;\nALTER TABLE activities ADD COLUMN score INTEGER;";

        let first = manager
            .execute_multiple_statements_with_transaction(sql)
            .unwrap();
        assert_eq!(first, StatementReport { executed: 2, tolerated: 0 });
        let after_first = fx.columns("activities");

        let second = manager
            .execute_multiple_statements_with_transaction(sql)
            .unwrap();
        assert_eq!(second, StatementReport { executed: 0, tolerated: 2 });
        assert_eq!(fx.columns("activities"), after_first);
    }

    #[test]
    fn failing_statement_rolls_back_the_whole_script() {
        let fx = Fixture::new();
        let manager = fx.manager();
        let sql = "ALTER TABLE activities ADD COLUMN a TEXT;
                   ALTER TABLE activities ADD COLUMN b TEXT;
                   ALTER TABLE missing_table ADD COLUMN c TEXT;
                   ALTER TABLE activities ADD COLUMN d TEXT;";

        let err = manager
            .execute_multiple_statements_with_transaction(sql)
            .unwrap_err();
        match err {
            DbError::Statement {
                index,
                total,
                statement,
                ..
            } => {
                assert_eq!((index, total), (3, 4));
                assert!(statement.contains("missing_table"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let columns = fx.columns("activities");
        for col in ["a", "b", "d"] {
            assert!(!columns.contains(&col.to_string()), "{col} should be rolled back");
        }
    }

    #[test]
    fn trigger_migration_executes_as_one_statement() {
        let fx = Fixture::new();
        fx.write(
            "001_activity_log.sql",
            "CREATE TABLE activity_log (activity_id INTEGER, note TEXT);
             -- keep a trail of every new activity
             CREATE TRIGGER log_activity AFTER INSERT ON activities
             BEGIN
                 INSERT INTO activity_log (activity_id, note) VALUES (NEW.id, 'created; new');
                 INSERT INTO activity_log (activity_id, note) VALUES (NEW.id, 'second');
             END;",
        );
        fx.manager().run_migrations().unwrap();

        fx.db.run("INSERT INTO activities (name) VALUES ('walk')", []).unwrap();
        let logged = fx
            .db
            .get("SELECT COUNT(*) FROM activity_log", [], |row| row.get::<_, i64>(0))
            .unwrap();
        assert_eq!(logged, Some(2));
    }

    #[test]
    fn ledger_write_failure_rolls_back_the_migration() {
        let fx = Fixture::new();
        fx.write(
            "001_tags.sql",
            "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL);
             CREATE TRIGGER block_ledger BEFORE INSERT ON schema_migrations
             BEGIN
                 SELECT RAISE(ABORT, 'ledger unavailable');
             END;",
        );

        let err = fx.manager().run_migrations().unwrap_err();
        assert!(matches!(err, DbError::MigrationRun { ref version, .. } if version == "001"));
        assert!(!fx.db.table_exists("tags").unwrap());

        // The trigger went with the rollback, so the failure was recorded.
        let history = fx.manager().get_migration_history().unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
        assert!(history[0].error_message.as_deref().unwrap().contains("ledger unavailable"));
        assert_eq!(fx.manager().get_migration_status().pending, 1);
    }

    #[test]
    fn status_reports_error_instead_of_failing() {
        let fx = Fixture::new();
        fx.write("001_a.sql", "SELECT 1;");
        fx.db.close().unwrap();

        let status = fx.manager().get_migration_status();
        assert_eq!(status.available, 0);
        assert_eq!(status.pending, 0);
        assert!(status.error.unwrap().contains("not connected"));
    }

    #[test]
    fn pre_migration_backup_is_taken_when_enabled() {
        let mut fx = Fixture::new();
        fx.settings.backup.enabled = true;
        fx.write("001_add_category.sql", "ALTER TABLE activities ADD COLUMN category TEXT;");

        let report = fx.manager().run_migrations().unwrap();
        let backup = report.backup.expect("backup path");
        assert!(backup.exists());
        assert!(
            backup
                .file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with("_pre_migration.db")
        );
    }

    #[test]
    fn no_backup_when_nothing_is_pending() {
        let mut fx = Fixture::new();
        fx.settings.backup.enabled = true;

        let report = fx.manager().run_migrations().unwrap();
        assert!(report.backup.is_none());
        assert!(!fx.settings.backup.dir.exists());
    }

    #[test]
    fn baseline_marks_available_migrations_applied() {
        let fx = Fixture::new();
        fx.write("001_a.sql", "ALTER TABLE nowhere ADD COLUMN x TEXT;");
        fx.write("002_b.sql", "SELECT 1;");
        let manager = fx.manager();

        assert_eq!(manager.record_baseline().unwrap(), 2);
        assert_eq!(manager.record_baseline().unwrap(), 0);
        assert_eq!(manager.get_migration_status().pending, 0);
        assert!(manager.run_migrations().unwrap().applied.is_empty());
    }
}
