//! SQLite storage layer for logbook: one shared connection per database file,
//! versioned schema migrations with a ledger, first-run bootstrap and backups.
//!
//! Consumers create a [`ConnectionRegistry`], obtain a [`ConnectionManager`]
//! for their database path and call
//! [`ConnectionManager::initialize_database`]. Everything else is reached
//! through the connection primitives or [`MigrationManager`].

pub mod backup;
pub mod connection;
pub mod error;
pub mod initializer;
pub mod lock;
pub mod migrations;
pub mod policy;
pub mod settings;
pub mod sql_parser;

pub use backup::{BackupArtifact, BackupManager};
pub use connection::{ConnectionManager, ConnectionRegistry, Executor, RunResult};
pub use error::{DbError, DbResult};
pub use initializer::{DatabaseInitializer, InitMethod, InitializationReport};
pub use lock::MigrationLock;
pub use migrations::{
    MigrationFile, MigrationManager, MigrationRecord, MigrationRunReport, MigrationStatus,
    StatementReport,
};
pub use settings::{BackupSettings, DatabaseSettings};
pub use sql_parser::{SqlStatementParser, StatementKind};
