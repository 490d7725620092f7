use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use rusqlite::{Connection, OptionalExtension, Params, Row};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{DbError, DbResult};
use crate::initializer::{DatabaseInitializer, InitializationReport};
use crate::settings::DatabaseSettings;

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub last_id: i64,
    pub changes: usize,
}

/// Statement primitives bound to one locked connection. Handed to
/// [`ConnectionManager::transaction`] closures so that everything inside the
/// closure runs on the same connection without interleaving.
pub struct Executor<'c> {
    conn: &'c Connection,
}

impl<'c> Executor<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn run<P: Params>(&self, sql: &str, params: P) -> DbResult<RunResult> {
        let changes = self.conn.execute(sql, params)?;
        Ok(RunResult {
            last_id: self.conn.last_insert_rowid(),
            changes,
        })
    }

    /// First row mapped through `f`, or `None` when the query returns nothing.
    pub fn get<T, P, F>(&self, sql: &str, params: P, f: F) -> DbResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.conn.query_row(sql, params, f).optional()?)
    }

    pub fn all<T, P, F>(&self, sql: &str, params: P, f: F) -> DbResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Execute parameterless SQL, returning the raw engine error so callers
    /// can decide whether it is tolerable.
    pub fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    pub fn table_exists(&self, name: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// The single shared connection for one database file.
///
/// Obtained from a [`ConnectionRegistry`]; every caller asking for the same
/// resolved path gets the same instance.
#[derive(Debug)]
pub struct ConnectionManager {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    registry: Weak<ConnectionRegistry>,
}

impl ConnectionManager {
    fn new(path: PathBuf, registry: Weak<ConnectionRegistry>) -> Self {
        Self {
            path,
            conn: Mutex::new(None),
            registry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| DbError::Lock(format!("connection lock poisoned: {}", self.path.display())))
    }

    /// Open the native connection if it is not open yet. Returns `true` when
    /// this call opened it.
    pub fn connect(&self, journal_mode: &str) -> DbResult<bool> {
        let mut guard = self.lock()?;
        if guard.is_some() {
            return Ok(false);
        }

        let journal_mode = journal_mode.to_ascii_uppercase();
        if !JOURNAL_MODES.contains(&journal_mode.as_str()) {
            return Err(DbError::Settings(format!(
                "unsupported journal_mode {journal_mode}"
            )));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("opening database at {}", self.path.display());
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode={journal_mode}; PRAGMA foreign_keys=ON;"
        ))?;

        *guard = Some(conn);
        Ok(true)
    }

    /// Connect and bring the schema up to date. A no-op (returning `None`)
    /// when the connection is already open.
    pub fn initialize_database(
        self: &Arc<Self>,
        settings: &DatabaseSettings,
    ) -> DbResult<Option<InitializationReport>> {
        if !self.connect(&settings.journal_mode)? {
            debug!("database already initialized: {}", self.path.display());
            return Ok(None);
        }

        let initializer = DatabaseInitializer::new(Arc::clone(self), settings.clone());
        match initializer.initialize() {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                // Leave the manager unconnected so a retry initializes again.
                if let Err(close_err) = self.disconnect() {
                    warn!("failed to close {} after init error: {close_err}", self.path.display());
                }
                Err(e)
            }
        }
    }

    /// Run `f` against the open connection.
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> DbResult<T>,
    ) -> DbResult<T> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| DbError::NotConnected(self.path.clone()))?;
        f(conn)
    }

    pub fn run<P: Params>(&self, sql: &str, params: P) -> DbResult<RunResult> {
        self.with_connection(|conn| Executor::new(conn).run(sql, params))
    }

    pub fn get<T, P, F>(&self, sql: &str, params: P, f: F) -> DbResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_connection(|conn| Executor::new(conn).get(sql, params, f))
    }

    pub fn all<T, P, F>(&self, sql: &str, params: P, f: F) -> DbResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_connection(|conn| Executor::new(conn).all(sql, params, f))
    }

    pub fn table_exists(&self, name: &str) -> DbResult<bool> {
        self.with_connection(|conn| Executor::new(conn).table_exists(name))
    }

    /// Run `f` between `BEGIN` and `COMMIT`. Any error from `f` rolls the
    /// transaction back and is returned unchanged; a failing `ROLLBACK` is
    /// only logged.
    ///
    /// The connection stays locked for the duration of `f`, so `f` must use
    /// the provided [`Executor`] rather than calling back into this manager.
    pub fn transaction<T>(&self, f: impl FnOnce(&Executor<'_>) -> DbResult<T>) -> DbResult<T> {
        self.with_connection(|conn| {
            conn.execute_batch("BEGIN")
                .map_err(|source| DbError::Transaction {
                    action: "begin",
                    source,
                })?;

            match f(&Executor::new(conn)) {
                Ok(value) => match conn.execute_batch("COMMIT") {
                    Ok(()) => Ok(value),
                    Err(source) => {
                        rollback(conn);
                        Err(DbError::Transaction {
                            action: "commit",
                            source,
                        })
                    }
                },
                Err(e) => {
                    rollback(conn);
                    Err(e)
                }
            }
        })
    }

    /// Release the native handle and drop this manager from its registry, so
    /// the next lookup for the same path creates a fresh instance.
    pub fn close(&self) -> DbResult<()> {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.path, self);
        }
        self.disconnect()
    }

    fn disconnect(&self) -> DbResult<()> {
        let conn = self.lock()?.take();
        if let Some(conn) = conn {
            info!("closing database at {}", self.path.display());
            conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
        }
        Ok(())
    }
}

fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute_batch("ROLLBACK") {
        error!("transaction rollback failed: {e}");
    }
}

/// Owns one [`ConnectionManager`] per resolved database path.
///
/// Created once by the application root and shared by reference.
#[derive(Default)]
pub struct ConnectionRegistry {
    managers: Mutex<HashMap<PathBuf, Arc<ConnectionManager>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn managers(&self) -> DbResult<MutexGuard<'_, HashMap<PathBuf, Arc<ConnectionManager>>>> {
        self.managers
            .lock()
            .map_err(|_| DbError::Lock("connection registry lock poisoned".into()))
    }

    /// Return the manager for `path`, creating (but not connecting) it on
    /// first use.
    pub fn get_or_create(self: &Arc<Self>, path: impl AsRef<Path>) -> DbResult<Arc<ConnectionManager>> {
        let path = resolve_path(path.as_ref())?;
        let mut managers = self.managers()?;
        let manager = managers.entry(path.clone()).or_insert_with(|| {
            debug!("registering connection manager for {}", path.display());
            Arc::new(ConnectionManager::new(path.clone(), Arc::downgrade(self)))
        });
        Ok(Arc::clone(manager))
    }

    pub fn get(&self, path: impl AsRef<Path>) -> DbResult<Option<Arc<ConnectionManager>>> {
        let path = resolve_path(path.as_ref())?;
        Ok(self.managers()?.get(&path).cloned())
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.get(path), Ok(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.managers().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every registered connection. Used on shutdown.
    pub fn close_all(&self) -> DbResult<()> {
        let managers: Vec<_> = self.managers()?.drain().map(|(_, m)| m).collect();
        let mut first_error = None;
        for manager in managers {
            if let Err(e) = manager.close() {
                error!("failed to close {}: {e}", manager.path().display());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn remove(&self, path: &Path, manager: &ConnectionManager) {
        if let Ok(mut managers) = self.managers()
            && managers
                .get(path)
                .is_some_and(|m| std::ptr::eq(Arc::as_ptr(m), manager))
        {
            managers.remove(path);
        }
    }
}

/// Absolute form of `path` with its parent directory canonicalized when it
/// exists, so different spellings of one file share a manager.
fn resolve_path(path: &Path) -> DbResult<PathBuf> {
    let absolute = std::path::absolute(path)?;
    if let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return Ok(parent.join(name));
    }
    Ok(absolute)
}
