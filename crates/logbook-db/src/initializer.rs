//! Decides how a freshly opened database reaches the current schema: an empty
//! file is bootstrapped from the full schema script, anything else is brought
//! forward by the migration manager.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::connection::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::migrations::MigrationManager;
use crate::policy::{BOOTSTRAP_POLICY, Recovery, recovery_for};
use crate::settings::DatabaseSettings;
use crate::sql_parser::{SqlStatementParser, StatementKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    Bootstrap,
    Migrations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializationReport {
    pub is_new_database: bool,
    pub method: InitMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables_created: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations_applied: Option<usize>,
}

pub struct DatabaseInitializer {
    db: Arc<ConnectionManager>,
    settings: DatabaseSettings,
}

impl DatabaseInitializer {
    pub fn new(db: Arc<ConnectionManager>, settings: DatabaseSettings) -> Self {
        Self { db, settings }
    }

    /// True when the catalog lists no user tables.
    pub fn is_database_empty(&self) -> DbResult<bool> {
        self.db.with_connection(|conn| {
            let tables: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                    [],
                    |row| row.get(0),
                )
                .map_err(DbError::StateCheck)?;
            Ok(tables == 0)
        })
    }

    pub fn initialize(&self) -> DbResult<InitializationReport> {
        if self.is_database_empty()? {
            info!("empty database, bootstrapping from {}", self.settings.schema_file.display());
            let tables_created = self.bootstrap()?;
            return Ok(InitializationReport {
                is_new_database: true,
                method: InitMethod::Bootstrap,
                tables_created: Some(tables_created),
                migrations_applied: None,
            });
        }

        debug!("existing database, running migrations");
        let migrations = MigrationManager::new(Arc::clone(&self.db), self.settings.clone());
        migrations.initialize()?;
        let report = migrations.run_migrations()?;
        Ok(InitializationReport {
            is_new_database: false,
            method: InitMethod::Migrations,
            tables_created: None,
            migrations_applied: Some(report.applied.len()),
        })
    }

    /// Execute the schema script statement by statement, tables first, and
    /// return how many tables were created. Objects that already exist are
    /// skipped so an interrupted bootstrap can be re-run.
    fn bootstrap(&self) -> DbResult<usize> {
        let path = &self.settings.schema_file;
        if !path.is_file() {
            return Err(DbError::SchemaFileMissing(path.clone()));
        }
        let sql = std::fs::read_to_string(path)?;

        let mut statements: Vec<(StatementKind, String)> = SqlStatementParser::parse(&sql)
            .into_iter()
            .map(|s| (SqlStatementParser::classify(&s), s))
            .collect();
        // Stable, so statements of one kind keep their file order.
        statements.sort_by_key(|(kind, _)| kind.bootstrap_rank());

        let tables_created = self.db.with_connection(|conn| {
            let mut tables_created = 0;
            for (kind, statement) in &statements {
                match conn.execute_batch(statement) {
                    Ok(()) => {
                        if *kind == StatementKind::CreateTable {
                            tables_created += 1;
                        }
                    }
                    Err(source) => match recovery_for(BOOTSTRAP_POLICY, *kind, &source) {
                        Some(Recovery::SkipAsApplied) => {
                            debug!("bootstrap object already exists, skipping: {source}");
                        }
                        None => {
                            return Err(DbError::Bootstrap {
                                statement: statement.clone(),
                                source,
                            });
                        }
                    },
                }
            }
            Ok(tables_created)
        })?;
        info!(
            "bootstrap executed {} statements, created {} tables",
            statements.len(),
            tables_created
        );

        let migrations = MigrationManager::new(Arc::clone(&self.db), self.settings.clone());
        migrations.initialize()?;
        if self.settings.baseline_after_bootstrap {
            migrations.record_baseline()?;
        }
        Ok(tables_created)
    }
}
