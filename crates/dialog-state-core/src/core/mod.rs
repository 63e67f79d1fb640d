// crates/dialog-state-core/src/core/mod.rs
// ============================================================================
// Module: Dialog State Core Types
// Description: Identifiers, timestamps, and the session model.
// Purpose: Group the data types shared by the store and its backends.
// Dependencies: serde, serde_json
// ============================================================================

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod session;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::DEFAULT_SUBSTATE;
pub use identifiers::SUBSTATE_SEPARATOR;
pub use identifiers::StateId;
pub use session::STATE_ID_FIELD;
pub use session::Session;
pub use session::StateDocument;
pub use session::default_state_document;
pub use session::resolve_state_document;
pub use time::Timestamp;
