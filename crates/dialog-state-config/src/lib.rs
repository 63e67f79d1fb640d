// crates/dialog-state-config/src/lib.rs
// ============================================================================
// Module: Dialog State Config Library
// Description: Config model, validation, and state store wiring.
// Purpose: Single source of truth for dialog-state.toml semantics.
// Dependencies: dialog-state-core, serde, toml
// ============================================================================

//! ## Overview
//! `dialog-state-config` defines the configuration model for the dialog
//! state store, validates it fail-closed, and wires a [`StateStore`] from it.
//!
//! [`StateStore`]: dialog_state_core::StateStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;
pub mod wiring;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
pub use wiring::open_state_store;
