// crates/dialog-state-core/src/runtime/audit.rs
// ============================================================================
// Module: State Store Audit Logging
// Description: Structured audit events for session lifecycle changes.
// Purpose: Emit JSON-line logs without binding to a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The state store reports lifecycle transitions (creation, recreation,
//! writes, deletions, exhausted retries) as [`StateAuditEvent`] values.
//! Deployments route them through a [`StateAuditSink`]. State documents are
//! never included in events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::StateId;
use crate::core::Timestamp;
use crate::runtime::dialect::DialectFlavor;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lifecycle transition recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateAuditKind {
    /// Default session written for an absent id.
    SessionCreated,
    /// Expired session overwritten with the default document.
    SessionRecreated,
    /// Caller document upserted.
    StateWritten,
    /// Session and substates deleted.
    StateDeleted,
    /// Read loop hit its retry ceiling.
    ReadRetryExhausted,
}

/// State store audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Transition kind.
    pub kind: StateAuditKind,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Affected state id.
    pub state_id: String,
    /// Dialect that executed the statement.
    pub dialect: DialectFlavor,
    /// Rows removed, for deletions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    /// Reads performed, for exhausted retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl StateAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: StateAuditKind, state_id: &StateId, dialect: DialectFlavor) -> Self {
        Self {
            event: "dialog_state",
            kind,
            timestamp_ms: Timestamp::now().as_unix_millis(),
            state_id: state_id.as_str().to_string(),
            dialect,
            rows: None,
            attempts: None,
        }
    }

    /// Attaches a removed-row count.
    #[must_use]
    pub const fn with_rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Attaches a read-attempt count.
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for state store events.
pub trait StateAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &StateAuditEvent);
}

/// Audit sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStateAuditSink;

impl StateAuditSink for NoopStateAuditSink {
    fn record(&self, _event: &StateAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrStateAuditSink;

impl StateAuditSink for StderrStateAuditSink {
    fn record(&self, event: &StateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileStateAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileStateAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl StateAuditSink for FileStateAuditSink {
    fn record(&self, event: &StateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}
