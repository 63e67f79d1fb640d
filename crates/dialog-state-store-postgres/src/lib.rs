// crates/dialog-state-store-postgres/src/lib.rs
// ============================================================================
// Module: Dialog State Postgres Store
// Description: Postgres implementation of the session database seam.
// Purpose: Provide the standard-flavor backend for the dialog state store.
// Dependencies: dialog-state-core, postgres, r2d2
// ============================================================================

//! ## Overview
//! Exposes [`PostgresSessionDatabase`], a pooled
//! [`dialog_state_core::SessionDatabase`] for shared Postgres deployments.

pub mod store;

pub use store::PostgresSessionDatabase;
pub use store::PostgresSessionError;
pub use store::PostgresStoreConfig;
pub use store::shared_postgres_database;
