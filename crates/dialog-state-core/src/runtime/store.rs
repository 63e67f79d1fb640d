// crates/dialog-state-core/src/runtime/store.rs
// ============================================================================
// Module: Dialog State Store
// Description: Lazy-creating session store over a pluggable SQL backend.
// Purpose: Implement get/set/delete of conversation state with bounded retries.
// Dependencies: crate::{core, interfaces, runtime}, async-trait, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`StateStore`] is the public surface used by dialog engines. Reads create
//! a default session when the id is absent and recreate it when the expiry
//! policy reports it stale; both paths write and then re-read, bounded by
//! [`StateStoreConfig::max_read_attempts`]. Writes validate that the document
//! is a JSON object before touching the database. Deletes remove the session
//! and its substates in one statement.
//!
//! The store holds no mutable state of its own. Concurrent first reads of the
//! same id race on the backend upsert; the default document is idempotent so
//! every caller observes a consistent result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::DEFAULT_SUBSTATE;
use crate::core::Session;
use crate::core::StateDocument;
use crate::core::StateId;
use crate::core::Timestamp;
use crate::core::default_state_document;
use crate::core::resolve_state_document;
use crate::interfaces::DatabaseError;
use crate::interfaces::DialogStateStore;
use crate::interfaces::ExpiryPolicy;
use crate::interfaces::SessionDatabase;
use crate::interfaces::SessionRow;
use crate::interfaces::StateStoreError;
use crate::runtime::audit::NoopStateAuditSink;
use crate::runtime::audit::StateAuditEvent;
use crate::runtime::audit::StateAuditKind;
use crate::runtime::audit::StateAuditSink;
use crate::runtime::dialect::DialectFlavor;
use crate::runtime::dialect::SessionDialect;
use crate::runtime::dialect::dialect_for;
use crate::runtime::expiry::NeverExpires;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of reads `get_state` performs before giving up.
pub const DEFAULT_MAX_READ_ATTEMPTS: u32 = 3;
/// Smallest read ceiling: one read, one default write, one re-read.
pub const MIN_READ_ATTEMPTS: u32 = 2;
/// Maximum serialized state document size accepted on write.
pub const MAX_STATE_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Tunables for [`StateStore`].
///
/// # Invariants
/// - `max_read_attempts` is at least [`MIN_READ_ATTEMPTS`] once applied to a
///   store, so an absent session is always created before the ceiling hits.
/// - `max_state_bytes` is greater than zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStoreConfig {
    /// Reads `get_state` performs before failing with a transient error.
    pub max_read_attempts: u32,
    /// Substates removed by [`StateStore::delete_state_with_default_substates`].
    pub default_substates: Vec<String>,
    /// Maximum serialized document size in bytes.
    pub max_state_bytes: usize,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            max_read_attempts: DEFAULT_MAX_READ_ATTEMPTS,
            default_substates: vec![DEFAULT_SUBSTATE.to_string()],
            max_state_bytes: MAX_STATE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Outcome of one `get_state` read.
enum ReadOutcome {
    /// Session present and fresh.
    Fresh(StateDocument),
    /// No row for the id.
    Absent,
    /// Row present but the expiry policy rejected it.
    Expired,
}

/// Session state store backed by a [`SessionDatabase`].
#[derive(Clone)]
pub struct StateStore {
    /// Query-execution handle.
    database: Arc<dyn SessionDatabase>,
    /// Statement builder chosen from the handle's flavor.
    dialect: &'static dyn SessionDialect,
    /// Staleness predicate consulted on read.
    expiry: Arc<dyn ExpiryPolicy>,
    /// Lifecycle event sink.
    audit: Arc<dyn StateAuditSink>,
    /// Store tunables.
    config: StateStoreConfig,
}

impl StateStore {
    /// Creates a store with the default config, no expiry, and no audit sink.
    #[must_use]
    pub fn new(database: Arc<dyn SessionDatabase>) -> Self {
        let dialect = dialect_for(database.as_ref());
        Self {
            database,
            dialect,
            expiry: Arc::new(NeverExpires),
            audit: Arc::new(NoopStateAuditSink),
            config: StateStoreConfig::default(),
        }
    }

    /// Replaces the expiry policy.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Arc<dyn ExpiryPolicy>) -> Self {
        self.expiry = expiry;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn StateAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the store config; read ceilings below [`MIN_READ_ATTEMPTS`]
    /// are raised to it.
    #[must_use]
    pub fn with_config(mut self, mut config: StateStoreConfig) -> Self {
        config.max_read_attempts = config.max_read_attempts.max(MIN_READ_ATTEMPTS);
        self.config = config;
        self
    }

    /// Returns the dialect family in use.
    #[must_use]
    pub fn dialect(&self) -> DialectFlavor {
        self.dialect.flavor()
    }

    /// Returns the active config.
    #[must_use]
    pub const fn config(&self) -> &StateStoreConfig {
        &self.config
    }

    /// Loads the full session record without creating it.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] when the backend fails or the row is corrupt.
    pub async fn session(&self, state_id: &StateId) -> Result<Option<Session>, StateStoreError> {
        ensure_state_id(state_id)?;
        self.load_session(state_id).await
    }

    /// Deletes `state_id` with the configured default substates.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] when the backend fails.
    pub async fn delete_state_with_default_substates(
        &self,
        state_id: &StateId,
    ) -> Result<u64, StateStoreError> {
        let substates = self.config.default_substates.clone();
        self.delete_state(state_id, &substates).await
    }

    /// Reports backend readiness.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] when the backend is unavailable.
    pub async fn readiness(&self) -> Result<(), StateStoreError> {
        self.blocking(|database| database.readiness()).await
    }

    /// Runs one read and classifies the result.
    async fn read_once(&self, state_id: &StateId) -> Result<ReadOutcome, StateStoreError> {
        let Some(session) = self.load_session(state_id).await? else {
            return Ok(ReadOutcome::Absent);
        };
        let now = self.database.now();
        if self.expiry.is_expired(&session, now) {
            return Ok(ReadOutcome::Expired);
        }
        Ok(ReadOutcome::Fresh(session.state))
    }

    /// Selects and decodes the session row for `state_id`.
    async fn load_session(&self, state_id: &StateId) -> Result<Option<Session>, StateStoreError> {
        let statement = self.dialect.select_session(state_id);
        let row = self.blocking(move |database| database.query_session(&statement)).await?;
        row.map(decode_session_row).transpose()
    }

    /// Serializes and upserts a document.
    async fn write_document(
        &self,
        state_id: &StateId,
        document: &StateDocument,
    ) -> Result<(), StateStoreError> {
        let state_json = serde_json::to_string(document)
            .map_err(|err| StateStoreError::InvalidState(err.to_string()))?;
        if state_json.len() > self.config.max_state_bytes {
            return Err(StateStoreError::TooLarge {
                max_bytes: self.config.max_state_bytes,
                actual_bytes: state_json.len(),
            });
        }
        let now = self.database.now();
        let statement = self.dialect.upsert_session(state_id, &state_json, now);
        self.blocking(move |database| database.execute(&statement)).await?;
        Ok(())
    }

    /// Runs a blocking database call on the blocking thread pool.
    async fn blocking<T, F>(&self, call: F) -> Result<T, StateStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SessionDatabase) -> Result<T, DatabaseError> + Send + 'static,
    {
        let database = Arc::clone(&self.database);
        tokio::task::spawn_blocking(move || call(database.as_ref()))
            .await
            .map_err(|err| StateStoreError::Store(format!("database task failed: {err}")))?
            .map_err(StateStoreError::from)
    }

    /// Builds an audit event tagged with this store's dialect.
    fn event(&self, kind: StateAuditKind, state_id: &StateId) -> StateAuditEvent {
        StateAuditEvent::new(kind, state_id, self.dialect.flavor())
    }
}

#[async_trait]
impl DialogStateStore for StateStore {
    async fn get_state(&self, state_id: &StateId) -> Result<StateDocument, StateStoreError> {
        ensure_state_id(state_id)?;
        let max_attempts = self.config.max_read_attempts.max(MIN_READ_ATTEMPTS);
        let mut last_expired = false;
        for attempt in 1..=max_attempts {
            let outcome = self.read_once(state_id).await?;
            let kind = match outcome {
                ReadOutcome::Fresh(document) => return Ok(document),
                ReadOutcome::Absent => StateAuditKind::SessionCreated,
                ReadOutcome::Expired => StateAuditKind::SessionRecreated,
            };
            last_expired = kind == StateAuditKind::SessionRecreated;
            if attempt == max_attempts {
                break;
            }
            self.write_document(state_id, &default_state_document(state_id)).await?;
            self.audit.record(&self.event(kind, state_id));
        }
        self.audit.record(
            &self.event(StateAuditKind::ReadRetryExhausted, state_id).with_attempts(max_attempts),
        );
        let state_id = state_id.as_str().to_string();
        if last_expired {
            Err(StateStoreError::ExpiryLoop {
                state_id,
                attempts: max_attempts,
            })
        } else {
            Err(StateStoreError::TransientState {
                state_id,
                attempts: max_attempts,
            })
        }
    }

    async fn set_state(
        &self,
        state_id: &StateId,
        state: Option<Value>,
    ) -> Result<(), StateStoreError> {
        ensure_state_id(state_id)?;
        let document = resolve_state_document(state_id, state).map_err(|kind| {
            StateStoreError::InvalidState(format!("state must be a plain object, got {kind}"))
        })?;
        self.write_document(state_id, &document).await?;
        self.audit.record(&self.event(StateAuditKind::StateWritten, state_id));
        Ok(())
    }

    async fn delete_state(
        &self,
        state_id: &StateId,
        substates: &[String],
    ) -> Result<u64, StateStoreError> {
        ensure_state_id(state_id)?;
        let keys = state_id.deletion_keys(substates);
        let statement = self.dialect.delete_sessions(&keys);
        let rows = self.blocking(move |database| database.execute(&statement)).await?;
        self.audit.record(&self.event(StateAuditKind::StateDeleted, state_id).with_rows(rows));
        Ok(rows)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects blank state ids before any I/O.
fn ensure_state_id(state_id: &StateId) -> Result<(), StateStoreError> {
    if state_id.is_blank() {
        return Err(StateStoreError::InvalidState("state id must be non-empty".to_string()));
    }
    Ok(())
}

/// Decodes a raw row into a [`Session`].
fn decode_session_row(row: SessionRow) -> Result<Session, StateStoreError> {
    let value: Value = serde_json::from_str(&row.state)
        .map_err(|err| StateStoreError::Corrupt(format!("session {}: {err}", row.id)))?;
    let Value::Object(state) = value else {
        return Err(StateStoreError::Corrupt(format!(
            "session {}: stored state is not an object",
            row.id
        )));
    };
    Ok(Session {
        id: StateId::new(row.id),
        state,
        created_on: Timestamp::from_unix_millis(row.created_on),
        active_on: Timestamp::from_unix_millis(row.active_on),
    })
}

#[cfg(test)]
mod tests;
