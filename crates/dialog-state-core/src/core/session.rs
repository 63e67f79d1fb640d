// crates/dialog-state-core/src/core/session.rs
// ============================================================================
// Module: Dialog Session Model
// Description: Session records, state documents, and the default-document factory.
// Purpose: Single definition of what a session and an empty state look like.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Session`] is the persisted record for one [`StateId`]. Its `state` is a
//! JSON object; scalars, arrays, and `null` are never stored at the top
//! level. [`default_state_document`] is the only place the empty document
//! shape is defined.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::StateId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Key carrying the owning state id inside every default document.
pub const STATE_ID_FIELD: &str = "_stateId";

/// Structured conversation state stored per session.
pub type StateDocument = Map<String, Value>;

/// Persisted session record.
///
/// # Invariants
/// - `state` is always a JSON object.
/// - `active_on >= created_on` is intended but not enforced by every dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session key (state id or derived substate id).
    pub id: StateId,
    /// Conversation state document.
    pub state: StateDocument,
    /// When the row was (last) created.
    pub created_on: Timestamp,
    /// When the row was last written.
    pub active_on: Timestamp,
}

// ============================================================================
// SECTION: Session Factory
// ============================================================================

/// Builds the empty document for a brand-new or recreated session.
#[must_use]
pub fn default_state_document(state_id: &StateId) -> StateDocument {
    let mut document = Map::new();
    document.insert(STATE_ID_FIELD.to_string(), Value::String(state_id.as_str().to_string()));
    document
}

/// Resolves the document to persist for a `set_state` call.
///
/// `None` and JSON `null` fall back to [`default_state_document`]. Objects
/// pass through unchanged.
///
/// # Errors
///
/// Returns the rejected JSON kind label when `state` is a scalar or array.
pub fn resolve_state_document(
    state_id: &StateId,
    state: Option<Value>,
) -> Result<StateDocument, &'static str> {
    match state {
        None | Some(Value::Null) => Ok(default_state_document(state_id)),
        Some(Value::Object(document)) => Ok(document),
        Some(Value::Array(_)) => Err("array"),
        Some(Value::String(_)) => Err("string"),
        Some(Value::Number(_)) => Err("number"),
        Some(Value::Bool(_)) => Err("boolean"),
    }
}
