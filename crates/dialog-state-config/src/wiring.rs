// crates/dialog-state-config/src/wiring.rs
// ============================================================================
// Module: State Store Wiring
// Description: Builds a ready state store from validated configuration.
// Purpose: Connect the configured backend, expiry policy, and audit sink.
// Dependencies: dialog-state-core, dialog-state-store-sqlite,
//               dialog-state-store-postgres
// ============================================================================

//! ## Overview
//! [`open_state_store`] is the single entry point services use to turn a
//! [`DialogStateConfig`] into a [`StateStore`]. Backend construction blocks
//! (file I/O or a Postgres handshake), so async callers should run it on the
//! blocking pool.

use std::sync::Arc;

use dialog_state_core::FileStateAuditSink;
use dialog_state_core::NoopStateAuditSink;
use dialog_state_core::SessionDatabase;
use dialog_state_core::StateAuditSink;
use dialog_state_core::StateStore;
use dialog_state_core::StderrStateAuditSink;
use dialog_state_store_postgres::shared_postgres_database;
use dialog_state_store_sqlite::SqliteSessionDatabase;

use crate::config::AuditConfig;
use crate::config::AuditSinkType;
use crate::config::ConfigError;
use crate::config::DialogStateConfig;
use crate::config::StoreConfig;
use crate::config::StoreType;

/// Builds a state store for the validated configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] when validation fails or a backend or sink cannot
/// be opened.
pub fn open_state_store(config: &DialogStateConfig) -> Result<StateStore, ConfigError> {
    config.validate()?;
    let database = open_database(&config.store)?;
    let audit = open_audit_sink(&config.audit)?;
    Ok(StateStore::new(database)
        .with_config(config.session.store_config())
        .with_expiry(config.expiry.policy())
        .with_audit(audit))
}

/// Opens the configured session database.
fn open_database(store: &StoreConfig) -> Result<Arc<dyn SessionDatabase>, ConfigError> {
    match store.store_type {
        StoreType::Sqlite => {
            let database = SqliteSessionDatabase::open(&store.sqlite_config()?)
                .map_err(|err| ConfigError::Backend(err.to_string()))?;
            Ok(Arc::new(database))
        }
        StoreType::Postgres => shared_postgres_database(&store.postgres_config()?)
            .map_err(|err| ConfigError::Backend(err.to_string())),
    }
}

/// Opens the configured audit sink.
fn open_audit_sink(audit: &AuditConfig) -> Result<Arc<dyn StateAuditSink>, ConfigError> {
    match (audit.sink, &audit.path) {
        (AuditSinkType::None, _) => Ok(Arc::new(NoopStateAuditSink)),
        (AuditSinkType::Stderr, _) => Ok(Arc::new(StderrStateAuditSink)),
        (AuditSinkType::File, Some(path)) => FileStateAuditSink::new(path)
            .map(|sink| Arc::new(sink) as Arc<dyn StateAuditSink>)
            .map_err(|err| ConfigError::Backend(format!("audit log: {err}"))),
        (AuditSinkType::File, None) => {
            Err(ConfigError::Invalid("file audit sink requires path".to_string()))
        }
    }
}
