// crates/dialog-state-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Session Database
// Description: SessionDatabase backed by a single SQLite connection.
// Purpose: Persist dialog sessions for single-writer deployments.
// Dependencies: dialog-state-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`SessionDatabase`] on `SQLite`. It reports the
//! "lite" flavor, so the state store upserts with `INSERT OR REPLACE`.
//! Connection access is serialized through a mutex; the schema is created on
//! open when absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use dialog_state_core::DatabaseError;
use dialog_state_core::DialectFlavor;
use dialog_state_core::SessionDatabase;
use dialog_state_core::SessionRow;
use dialog_state_core::SqlValue;
use dialog_state_core::Statement;
use dialog_state_core::dialect_for_flavor;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqliteValue;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` session database.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` session database errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteSessionError {
    /// Filesystem error.
    #[error("sqlite session store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite session store db error: {0}")]
    Db(String),
    /// Invalid configuration or stored data.
    #[error("sqlite session store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteSessionError> for DatabaseError {
    fn from(error: SqliteSessionError) -> Self {
        match error {
            SqliteSessionError::Io(message) => Self::Io(message),
            SqliteSessionError::Db(message) => Self::Db(message),
            SqliteSessionError::Invalid(message) => Self::Corrupt(message),
        }
    }
}

// ============================================================================
// SECTION: Database
// ============================================================================

/// `SQLite`-backed session database.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
/// - The `dialog_sessions` table exists once construction succeeds.
#[derive(Clone)]
pub struct SqliteSessionDatabase {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSessionDatabase {
    /// Opens (creating if needed) a file-backed session database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteSessionError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        Self::from_connection(connection)
    }

    /// Opens a private in-memory database, mainly for tests and demos.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSessionError`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, SqliteSessionError> {
        let connection =
            Connection::open_in_memory().map_err(|err| SqliteSessionError::Db(err.to_string()))?;
        Self::from_connection(connection)
    }

    /// Wraps an open connection and creates the sessions table.
    fn from_connection(connection: Connection) -> Result<Self, SqliteSessionError> {
        let ddl = dialect_for_flavor(DialectFlavor::Lite).create_table();
        connection.execute_batch(&ddl.sql).map_err(|err| SqliteSessionError::Db(err.to_string()))?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Runs `call` with exclusive access to the connection.
    fn with_connection<T>(
        &self,
        call: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, SqliteSessionError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteSessionError::Db("mutex poisoned".to_string()))?;
        call(&guard).map_err(|err| SqliteSessionError::Db(err.to_string()))
    }
}

impl SessionDatabase for SqliteSessionDatabase {
    fn is_lite_backend(&self) -> bool {
        true
    }

    fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError> {
        let params = bind_params(statement);
        let changed = self.with_connection(|connection| {
            connection.execute(&statement.sql, params_from_iter(params.iter()))
        })?;
        u64::try_from(changed)
            .map_err(|_| DatabaseError::Db("affected row count overflow".to_string()))
    }

    fn query_session(&self, statement: &Statement) -> Result<Option<SessionRow>, DatabaseError> {
        let params = bind_params(statement);
        let row = self.with_connection(|connection| {
            connection
                .query_row(&statement.sql, params_from_iter(params.iter()), |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        state: row.get(1)?,
                        created_on: row.get(2)?,
                        active_on: row.get(3)?,
                    })
                })
                .optional()
        })?;
        Ok(row)
    }

    fn readiness(&self) -> Result<(), DatabaseError> {
        self.with_connection(|connection| connection.query_row("SELECT 1", [], |_| Ok(())))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts dialect parameters into `SQLite` values.
fn bind_params(statement: &Statement) -> Vec<SqliteValue> {
    statement
        .params
        .iter()
        .map(|param| match param {
            SqlValue::Text(value) => SqliteValue::Text(value.clone()),
            SqlValue::Integer(value) => SqliteValue::Integer(*value),
        })
        .collect()
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteSessionError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteSessionError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteSessionError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteSessionError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteSessionError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteSessionError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteSessionError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteSessionError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteSessionError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteSessionError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteSessionError::Db(err.to_string()))?;
    Ok(())
}
