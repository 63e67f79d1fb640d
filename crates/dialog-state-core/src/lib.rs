// crates/dialog-state-core/src/lib.rs
// ============================================================================
// Module: Dialog State Core Library
// Description: Public API surface for the dialog session state store.
// Purpose: Expose session types, backend interfaces, and the state store.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Dialog state core persists one JSON document per conversation in a
//! `dialog_sessions` table. Sessions are created on first read, overwritten
//! by every write, and deleted together with their substates. Backends plug
//! in through [`SessionDatabase`]; the SQL upsert form is chosen per backend
//! family by a [`SessionDialect`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::DatabaseError;
pub use interfaces::DialogStateStore;
pub use interfaces::ExpiryPolicy;
pub use interfaces::SessionDatabase;
pub use interfaces::SessionRow;
pub use interfaces::SqlValue;
pub use interfaces::StateStoreError;
pub use interfaces::Statement;
pub use runtime::*;
