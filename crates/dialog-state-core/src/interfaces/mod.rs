// crates/dialog-state-core/src/interfaces/mod.rs
// ============================================================================
// Module: Dialog State Interfaces
// Description: Backend-agnostic seams for databases, expiry, and the store API.
// Purpose: Let backends and policies plug into the state store without coupling.
// Dependencies: crate::core, async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The state store talks to its environment through three seams:
//! - [`SessionDatabase`]: a handle that runs parameterized statements against
//!   the `dialog_sessions` table and reports its backend flavor.
//! - [`ExpiryPolicy`]: decides whether a loaded session is stale.
//! - [`DialogStateStore`]: the asynchronous surface consumed by dialog engines.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::Session;
use crate::core::StateDocument;
use crate::core::StateId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Bound parameter value for a dialect statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// UTF-8 text parameter.
    Text(String),
    /// 64-bit integer parameter.
    Integer(i64),
}

/// SQL text plus positional parameters produced by a dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// SQL text using the dialect's placeholder style.
    pub sql: String,
    /// Positional parameters in placeholder order.
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Creates a statement with no parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends a text parameter.
    #[must_use]
    pub fn bind_text(mut self, value: impl Into<String>) -> Self {
        self.params.push(SqlValue::Text(value.into()));
        self
    }

    /// Appends an integer parameter.
    #[must_use]
    pub fn bind_integer(mut self, value: i64) -> Self {
        self.params.push(SqlValue::Integer(value));
        self
    }
}

/// Raw `dialog_sessions` row as returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    /// Row key.
    pub id: String,
    /// JSON-encoded state document.
    pub state: String,
    /// Creation time in unix milliseconds.
    pub created_on: i64,
    /// Last write time in unix milliseconds.
    pub active_on: i64,
}

// ============================================================================
// SECTION: Session Database
// ============================================================================

/// Errors reported by a [`SessionDatabase`].
///
/// # Invariants
/// - Messages never embed state documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Connection or filesystem failure.
    #[error("session database io error: {0}")]
    Io(String),
    /// Statement execution failure.
    #[error("session database error: {0}")]
    Db(String),
    /// Stored data could not be decoded.
    #[error("session database corruption: {0}")]
    Corrupt(String),
}

/// Query-execution handle over the `dialog_sessions` table.
///
/// Implementations are blocking; the state store moves calls onto the blocking
/// thread pool.
pub trait SessionDatabase: Send + Sync {
    /// Reports whether the backend is the single-writer ("lite") flavor.
    fn is_lite_backend(&self) -> bool;

    /// Returns the timestamp used for `created_on` / `active_on` writes.
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    /// Executes a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when execution fails.
    fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError>;

    /// Runs a query expected to return at most one session row.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the query fails or the row is malformed.
    fn query_session(&self, statement: &Statement) -> Result<Option<SessionRow>, DatabaseError>;

    /// Reports database readiness for liveness probes.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the database is unavailable.
    fn readiness(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Expiry
// ============================================================================

/// Decides whether a loaded session should be discarded and recreated.
pub trait ExpiryPolicy: Send + Sync {
    /// Returns true when `session` is stale as of `now`.
    fn is_expired(&self, session: &Session, now: Timestamp) -> bool;
}

// ============================================================================
// SECTION: State Store
// ============================================================================

/// State store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateStoreError {
    /// Caller supplied an invalid state id or document.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Backend connectivity failure.
    #[error("state store io error: {0}")]
    Io(String),
    /// Backend reported an error.
    #[error("state store error: {0}")]
    Store(String),
    /// Stored data is not a valid session.
    #[error("state store corruption: {0}")]
    Corrupt(String),
    /// Serialized document exceeds the configured size limit.
    #[error("state store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
    /// Session stayed absent after every permitted read attempt.
    #[error("session {state_id} still absent after {attempts} read attempts")]
    TransientState {
        /// Affected state id.
        state_id: String,
        /// Reads performed.
        attempts: u32,
    },
    /// Expiry policy kept reporting the session expired after recreation.
    #[error("session {state_id} still expired after {attempts} read attempts")]
    ExpiryLoop {
        /// Affected state id.
        state_id: String,
        /// Reads performed.
        attempts: u32,
    },
}

impl From<DatabaseError> for StateStoreError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Io(message) => Self::Io(message),
            DatabaseError::Db(message) => Self::Store(message),
            DatabaseError::Corrupt(message) => Self::Corrupt(message),
        }
    }
}

/// Session state operations consumed by the dialog engine.
#[async_trait]
pub trait DialogStateStore: Send + Sync {
    /// Returns the document for `state_id`, creating a default session when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] when the backend fails or the retry ceiling
    /// is exceeded. A missing session is never an error.
    async fn get_state(&self, state_id: &StateId) -> Result<StateDocument, StateStoreError>;

    /// Upserts the document for `state_id`; `None` stores the default document.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::InvalidState`] when `state` is not a JSON
    /// object, before any I/O.
    async fn set_state(
        &self,
        state_id: &StateId,
        state: Option<Value>,
    ) -> Result<(), StateStoreError>;

    /// Deletes `state_id` and its named substates in one statement.
    ///
    /// Returns the number of rows removed; missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] when the backend fails.
    async fn delete_state(
        &self,
        state_id: &StateId,
        substates: &[String],
    ) -> Result<u64, StateStoreError>;
}
