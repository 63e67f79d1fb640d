// crates/dialog-state-config/src/config.rs
// ============================================================================
// Module: Dialog State Configuration
// Description: Configuration loading and validation for the state store.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: dialog-state-core, dialog-state-store-sqlite,
//               dialog-state-store-postgres, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section validates itself; unknown keys are rejected. Sections map
//! onto the runtime config types of the core and backend crates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dialog_state_core::DEFAULT_MAX_READ_ATTEMPTS;
use dialog_state_core::DEFAULT_SUBSTATE;
use dialog_state_core::ExpiryPolicy;
use dialog_state_core::IdleTimeoutExpiry;
use dialog_state_core::MAX_STATE_BYTES;
use dialog_state_core::MIN_READ_ATTEMPTS;
use dialog_state_core::NeverExpires;
use dialog_state_core::StateStoreConfig;
use dialog_state_store_postgres::PostgresStoreConfig;
use dialog_state_store_sqlite::SqliteStoreConfig;
use dialog_state_store_sqlite::SqliteStoreMode;
use dialog_state_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "dialog-state.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "DIALOG_STATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum Postgres pool size.
pub(crate) const MAX_POOL_CONNECTIONS: u32 = 256;
/// Upper bound on the read retry ceiling.
pub(crate) const MAX_READ_ATTEMPTS_LIMIT: u32 = 32;
/// Maximum number of default substates.
pub(crate) const MAX_DEFAULT_SUBSTATES: usize = 64;
/// Maximum length of a substate name.
pub(crate) const MAX_SUBSTATE_NAME_LENGTH: usize = 128;

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Dialog state store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialogStateConfig {
    /// Backend selection and connection settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Session read and delete behavior.
    #[serde(default)]
    pub session: SessionConfig,
    /// Expiry policy settings.
    #[serde(default)]
    pub expiry: ExpiryConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl DialogStateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.session.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Session database backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the `SQLite` (lite) backend.
    #[default]
    Sqlite,
    /// Use the Postgres (standard) backend.
    Postgres,
}

/// Session database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Postgres connection string when using the postgres backend.
    #[serde(default)]
    pub connection: Option<String>,
    /// Postgres pool size override.
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// Postgres connect timeout override in milliseconds.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Postgres statement timeout override in milliseconds.
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            connection: None,
            max_connections: None,
            connect_timeout_ms: None,
            statement_timeout_ms: None,
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_file_path("store path", path)?;
                if self.connection.is_some()
                    || self.max_connections.is_some()
                    || self.connect_timeout_ms.is_some()
                    || self.statement_timeout_ms.is_some()
                {
                    return Err(ConfigError::Invalid(
                        "sqlite store must not set postgres options".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Postgres => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "postgres store must not set path".to_string(),
                    ));
                }
                let connection = self.connection.as_deref().unwrap_or_default();
                if connection.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "postgres store requires connection".to_string(),
                    ));
                }
                if let Some(max) = self.max_connections
                    && (max == 0 || max > MAX_POOL_CONNECTIONS)
                {
                    return Err(ConfigError::Invalid(format!(
                        "store max_connections must be between 1 and {MAX_POOL_CONNECTIONS}"
                    )));
                }
                if self.connect_timeout_ms == Some(0) || self.statement_timeout_ms == Some(0) {
                    return Err(ConfigError::Invalid(
                        "store timeouts must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Builds the `SQLite` backend config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the store is not a configured sqlite store.
    pub fn sqlite_config(&self) -> Result<SqliteStoreConfig, ConfigError> {
        let path = match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => path.clone(),
            _ => return Err(ConfigError::Invalid("store is not a sqlite store".to_string())),
        };
        Ok(SqliteStoreConfig {
            path,
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        })
    }

    /// Builds the Postgres backend config, filling unset fields from defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the store is not a configured postgres store.
    pub fn postgres_config(&self) -> Result<PostgresStoreConfig, ConfigError> {
        let connection = match (self.store_type, &self.connection) {
            (StoreType::Postgres, Some(connection)) => connection.clone(),
            _ => return Err(ConfigError::Invalid("store is not a postgres store".to_string())),
        };
        let defaults = PostgresStoreConfig::default();
        Ok(PostgresStoreConfig {
            connection,
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            connect_timeout_ms: self.connect_timeout_ms.unwrap_or(defaults.connect_timeout_ms),
            statement_timeout_ms: self
                .statement_timeout_ms
                .unwrap_or(defaults.statement_timeout_ms),
        })
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Session read and delete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Reads `get_state` performs before failing.
    #[serde(default = "default_max_read_attempts")]
    pub max_read_attempts: u32,
    /// Substates removed alongside a session by default.
    #[serde(default = "default_substates")]
    pub default_substates: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_read_attempts: default_max_read_attempts(),
            default_substates: default_substates(),
        }
    }
}

impl SessionConfig {
    /// Validates session configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_READ_ATTEMPTS ..= MAX_READ_ATTEMPTS_LIMIT).contains(&self.max_read_attempts) {
            return Err(ConfigError::Invalid(format!(
                "session max_read_attempts must be between {MIN_READ_ATTEMPTS} and \
                 {MAX_READ_ATTEMPTS_LIMIT}"
            )));
        }
        if self.default_substates.len() > MAX_DEFAULT_SUBSTATES {
            return Err(ConfigError::Invalid(
                "session default_substates exceeds max entries".to_string(),
            ));
        }
        for name in &self.default_substates {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "session default_substates entries must be non-empty".to_string(),
                ));
            }
            if name.len() > MAX_SUBSTATE_NAME_LENGTH {
                return Err(ConfigError::Invalid(
                    "session default_substates entry too long".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Converts to the runtime store config.
    #[must_use]
    pub fn store_config(&self) -> StateStoreConfig {
        StateStoreConfig {
            max_read_attempts: self.max_read_attempts,
            default_substates: self.default_substates.clone(),
            max_state_bytes: MAX_STATE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Expiry
// ============================================================================

/// Expiry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpiryConfig {
    /// Idle timeout in milliseconds; zero disables expiry.
    #[serde(default)]
    pub idle_timeout_ms: u64,
}

impl ExpiryConfig {
    /// Builds the configured expiry policy.
    #[must_use]
    pub fn policy(&self) -> Arc<dyn ExpiryPolicy> {
        if self.idle_timeout_ms == 0 {
            Arc::new(NeverExpires)
        } else {
            Arc::new(IdleTimeoutExpiry::new(Duration::from_millis(self.idle_timeout_ms)))
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// Drop audit events.
    #[default]
    None,
    /// Write JSON lines to stderr.
    Stderr,
    /// Append JSON lines to a file.
    File,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, Some(path)) => validate_file_path("audit path", path),
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "audit path is only valid for the file sink".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading, validation, or wiring errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Backend or sink initialization failure.
    #[error("config backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the default busy timeout for `SQLite` stores.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Returns the default read retry ceiling.
const fn default_max_read_attempts() -> u32 {
    DEFAULT_MAX_READ_ATTEMPTS
}

/// Returns the default substate list.
fn default_substates() -> Vec<String> {
    vec![DEFAULT_SUBSTATE.to_string()]
}

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured database or log path.
fn validate_file_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
