// crates/dialog-state-core/src/runtime/mod.rs
// ============================================================================
// Module: Dialog State Runtime
// Description: State store, SQL dialects, expiry policies, and audit sinks.
// Purpose: Implement the session lifecycle on top of the interface seams.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the session lifecycle. The store is the only
//! entry point used by callers; dialects, expiry policies, and audit sinks are
//! injected into it.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod dialect;
pub mod expiry;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileStateAuditSink;
pub use audit::NoopStateAuditSink;
pub use audit::StateAuditEvent;
pub use audit::StateAuditKind;
pub use audit::StateAuditSink;
pub use audit::StderrStateAuditSink;
pub use dialect::DialectFlavor;
pub use dialect::LiteDialect;
pub use dialect::SESSIONS_TABLE;
pub use dialect::SessionDialect;
pub use dialect::StandardDialect;
pub use dialect::dialect_for;
pub use dialect::dialect_for_flavor;
pub use expiry::IdleTimeoutExpiry;
pub use expiry::NeverExpires;
pub use store::DEFAULT_MAX_READ_ATTEMPTS;
pub use store::MAX_STATE_BYTES;
pub use store::MIN_READ_ATTEMPTS;
pub use store::StateStore;
pub use store::StateStoreConfig;
