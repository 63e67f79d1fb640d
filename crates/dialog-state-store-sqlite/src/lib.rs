// crates/dialog-state-store-sqlite/src/lib.rs
// ============================================================================
// Module: Dialog State SQLite Store
// Description: SQLite implementation of the session database seam.
// Purpose: Provide the lite-flavor backend for the dialog state store.
// Dependencies: dialog-state-core, rusqlite
// ============================================================================

//! ## Overview
//! Exposes [`SqliteSessionDatabase`], a [`dialog_state_core::SessionDatabase`]
//! that stores sessions in a local `SQLite` file or in memory.

pub mod store;

pub use store::SqliteSessionDatabase;
pub use store::SqliteSessionError;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
