// crates/dialog-state-core/src/runtime/dialect.rs
// ============================================================================
// Module: Session SQL Dialects
// Description: Per-backend statement builders for the dialog_sessions table.
// Purpose: Choose and parameterize the upsert form for each backend family.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Two dialects exist:
//! - [`LiteDialect`] (`SQLite`): upsert is `INSERT OR REPLACE`, so every write
//!   replaces the whole row and resets `created_on`.
//! - [`StandardDialect`] (Postgres): upsert is `INSERT .. ON CONFLICT (id) DO
//!   UPDATE`, touching only `state` and `active_on`.
//!
//! Dialects hold no state. [`dialect_for`] picks one from a database handle's
//! flavor probe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::StateId;
use crate::core::Timestamp;
use crate::interfaces::SessionDatabase;
use crate::interfaces::Statement;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Table holding one row per session.
pub const SESSIONS_TABLE: &str = "dialog_sessions";

// ============================================================================
// SECTION: Dialect Trait
// ============================================================================

/// Backend family served by a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectFlavor {
    /// Single-writer backend (`SQLite`).
    Lite,
    /// Multi-writer backend (Postgres).
    Standard,
}

impl DialectFlavor {
    /// Returns the stable label used in audit events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Standard => "standard",
        }
    }
}

/// Statement builder for one backend family.
pub trait SessionDialect: Send + Sync {
    /// Backend family this dialect targets.
    fn flavor(&self) -> DialectFlavor;

    /// DDL creating the sessions table when absent.
    fn create_table(&self) -> Statement;

    /// Selects `id, state, created_on, active_on` for one key.
    fn select_session(&self, state_id: &StateId) -> Statement;

    /// Inserts or overwrites the session row for `state_id`.
    ///
    /// `now` is used for both `created_on` and `active_on` on fresh inserts.
    fn upsert_session(&self, state_id: &StateId, state_json: &str, now: Timestamp) -> Statement;

    /// Deletes every row whose id is in `state_ids`.
    fn delete_sessions(&self, state_ids: &[StateId]) -> Statement;
}

// ============================================================================
// SECTION: Lite Dialect
// ============================================================================

/// `SQLite` dialect: replace-by-key upsert.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteDialect;

impl SessionDialect for LiteDialect {
    fn flavor(&self) -> DialectFlavor {
        DialectFlavor::Lite
    }

    fn create_table(&self) -> Statement {
        Statement::new(format!(
            "CREATE TABLE IF NOT EXISTS {SESSIONS_TABLE} (id TEXT PRIMARY KEY NOT NULL, state \
             TEXT NOT NULL, created_on INTEGER NOT NULL, active_on INTEGER NOT NULL)"
        ))
    }

    fn select_session(&self, state_id: &StateId) -> Statement {
        Statement::new(format!(
            "SELECT id, state, created_on, active_on FROM {SESSIONS_TABLE} WHERE id = ?1"
        ))
        .bind_text(state_id.as_str())
    }

    fn upsert_session(&self, state_id: &StateId, state_json: &str, now: Timestamp) -> Statement {
        Statement::new(format!(
            "INSERT OR REPLACE INTO {SESSIONS_TABLE} (id, state, created_on, active_on) VALUES \
             (?1, ?2, ?3, ?3)"
        ))
        .bind_text(state_id.as_str())
        .bind_text(state_json)
        .bind_integer(now.as_unix_millis())
    }

    fn delete_sessions(&self, state_ids: &[StateId]) -> Statement {
        let placeholders = placeholder_list('?', state_ids.len());
        bind_ids(
            Statement::new(format!("DELETE FROM {SESSIONS_TABLE} WHERE id IN ({placeholders})")),
            state_ids,
        )
    }
}

// ============================================================================
// SECTION: Standard Dialect
// ============================================================================

/// Postgres dialect: insert with conflict resolution, `created_on` preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDialect;

impl SessionDialect for StandardDialect {
    fn flavor(&self) -> DialectFlavor {
        DialectFlavor::Standard
    }

    fn create_table(&self) -> Statement {
        Statement::new(format!(
            "CREATE TABLE IF NOT EXISTS {SESSIONS_TABLE} (id TEXT PRIMARY KEY NOT NULL, state \
             TEXT NOT NULL, created_on BIGINT NOT NULL, active_on BIGINT NOT NULL)"
        ))
    }

    fn select_session(&self, state_id: &StateId) -> Statement {
        Statement::new(format!(
            "SELECT id, state, created_on, active_on FROM {SESSIONS_TABLE} WHERE id = $1"
        ))
        .bind_text(state_id.as_str())
    }

    fn upsert_session(&self, state_id: &StateId, state_json: &str, now: Timestamp) -> Statement {
        Statement::new(format!(
            "INSERT INTO {SESSIONS_TABLE} (id, state, created_on, active_on) VALUES ($1, $2, $3, \
             $3) ON CONFLICT (id) DO UPDATE SET active_on = EXCLUDED.active_on, state = \
             EXCLUDED.state"
        ))
        .bind_text(state_id.as_str())
        .bind_text(state_json)
        .bind_integer(now.as_unix_millis())
    }

    fn delete_sessions(&self, state_ids: &[StateId]) -> Statement {
        let placeholders = placeholder_list('$', state_ids.len());
        bind_ids(
            Statement::new(format!("DELETE FROM {SESSIONS_TABLE} WHERE id IN ({placeholders})")),
            state_ids,
        )
    }
}

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Shared lite dialect instance.
static LITE: LiteDialect = LiteDialect;
/// Shared standard dialect instance.
static STANDARD: StandardDialect = StandardDialect;

/// Returns the dialect for a flavor.
#[must_use]
pub fn dialect_for_flavor(flavor: DialectFlavor) -> &'static dyn SessionDialect {
    match flavor {
        DialectFlavor::Lite => &LITE,
        DialectFlavor::Standard => &STANDARD,
    }
}

/// Picks the dialect matching a database handle.
#[must_use]
pub fn dialect_for(database: &dyn SessionDatabase) -> &'static dyn SessionDialect {
    if database.is_lite_backend() {
        dialect_for_flavor(DialectFlavor::Lite)
    } else {
        dialect_for_flavor(DialectFlavor::Standard)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders `count` numbered placeholders (`?1, ?2` or `$1, $2`).
fn placeholder_list(prefix: char, count: usize) -> String {
    (1..=count).map(|index| format!("{prefix}{index}")).collect::<Vec<_>>().join(", ")
}

/// Binds every id as a text parameter.
fn bind_ids(statement: Statement, state_ids: &[StateId]) -> Statement {
    state_ids.iter().fold(statement, |statement, id| statement.bind_text(id.as_str()))
}
