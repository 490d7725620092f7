use std::path::PathBuf;

use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Failure categories of the storage layer.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to check database state: {0}")]
    StateCheck(#[source] rusqlite::Error),

    #[error("bootstrap schema file not found: {}", .0.display())]
    SchemaFileMissing(PathBuf),

    #[error("bootstrap statement failed: {source} (statement: {statement})")]
    Bootstrap {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to initialize migration ledger: {0}")]
    LedgerInit(#[source] rusqlite::Error),

    /// A single statement inside a migration failed. `index` is 1-based.
    #[error("statement {index} of {total} failed: {source} (statement: {statement})")]
    Statement {
        index: usize,
        total: usize,
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("transaction {action} failed: {source}")]
    Transaction {
        action: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration {version} failed: {source}")]
    MigrationRun {
        version: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("backup failed: {0}")]
    Backup(String),

    #[error("restore failed: {0}")]
    Restore(String),

    #[error("database is not connected: {}", .0.display())]
    NotConnected(PathBuf),

    #[error("invalid database setting: {0}")]
    Settings(String),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DbError> for logbook_common::Error {
    fn from(e: DbError) -> Self {
        match e {
            DbError::MigrationRun { .. } | DbError::Statement { .. } => {
                logbook_common::Error::Migration(e.to_string())
            }
            DbError::Backup(_) | DbError::Restore(_) => logbook_common::Error::Backup(e.to_string()),
            DbError::SchemaFileMissing(_) => logbook_common::Error::NotFound(e.to_string()),
            other => logbook_common::Error::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_error_reports_position_and_text() {
        let e = DbError::Statement {
            index: 3,
            total: 4,
            statement: "ALTER TABLE missing ADD COLUMN c TEXT".into(),
            source: rusqlite::Error::InvalidQuery,
        };
        let msg = e.to_string();
        assert!(msg.starts_with("statement 3 of 4 failed"));
        assert!(msg.contains("ALTER TABLE missing ADD COLUMN c TEXT"));
    }

    #[test]
    fn converts_into_common_error_categories() {
        let e: logbook_common::Error = DbError::Backup("disk full".into()).into();
        assert!(matches!(e, logbook_common::Error::Backup(_)));

        let e: logbook_common::Error = DbError::SchemaFileMissing("schema.sql".into()).into();
        assert!(matches!(e, logbook_common::Error::NotFound(_)));

        let e: logbook_common::Error = DbError::Lock("held".into()).into();
        assert!(matches!(e, logbook_common::Error::Database(_)));
    }
}
