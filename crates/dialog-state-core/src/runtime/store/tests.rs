// crates/dialog-state-core/src/runtime/store/tests.rs
// ============================================================================
// Module: State Store Unit Tests
// Description: Exercise the state store against a scripted in-memory database.
// Purpose: Validate lazy creation, validation, deletion, and retry ceilings.
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Unit tests use expect for setup clarity."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use serde_json::Value;
use serde_json::json;

use super::MIN_READ_ATTEMPTS;
use super::StateStore;
use super::StateStoreConfig;
use crate::core::Session;
use crate::core::StateId;
use crate::core::Timestamp;
use crate::interfaces::DatabaseError;
use crate::interfaces::DialogStateStore;
use crate::interfaces::ExpiryPolicy;
use crate::interfaces::SessionDatabase;
use crate::interfaces::SessionRow;
use crate::interfaces::SqlValue;
use crate::interfaces::StateStoreError;
use crate::interfaces::Statement;
use crate::runtime::audit::StateAuditEvent;
use crate::runtime::audit::StateAuditKind;
use crate::runtime::audit::StateAuditSink;
use crate::runtime::dialect::DialectFlavor;
use crate::runtime::expiry::IdleTimeoutExpiry;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// In-memory database that interprets the statements both dialects emit.
#[derive(Default)]
struct ScriptedDatabase {
    /// Lite (`SQLite`) flavor when true.
    lite: bool,
    /// Rows keyed by id.
    rows: Mutex<BTreeMap<String, SessionRow>>,
    /// Executed SQL, in order.
    log: Mutex<Vec<String>>,
    /// Clock returned by `now()`.
    clock: AtomicI64,
    /// Accept writes without persisting them.
    drop_writes: AtomicBool,
}

impl ScriptedDatabase {
    fn lite() -> Self {
        Self {
            lite: true,
            clock: AtomicI64::new(1_000),
            ..Self::default()
        }
    }

    fn standard() -> Self {
        Self {
            lite: false,
            clock: AtomicI64::new(1_000),
            ..Self::default()
        }
    }

    fn advance(&self, millis: i64) {
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }

    fn row(&self, id: &str) -> Option<SessionRow> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    fn insert_raw(&self, id: &str, state: &str, created_on: i64, active_on: i64) {
        self.rows.lock().unwrap().insert(
            id.to_string(),
            SessionRow {
                id: id.to_string(),
                state: state.to_string(),
                created_on,
                active_on,
            },
        );
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn text(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(text) => text.clone(),
        SqlValue::Integer(value) => panic!("expected text parameter, got {value}"),
    }
}

fn integer(value: &SqlValue) -> i64 {
    match value {
        SqlValue::Integer(value) => *value,
        SqlValue::Text(text) => panic!("expected integer parameter, got {text}"),
    }
}

impl SessionDatabase for ScriptedDatabase {
    fn is_lite_backend(&self) -> bool {
        self.lite
    }

    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.clock.load(Ordering::SeqCst))
    }

    fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError> {
        self.log.lock().unwrap().push(statement.sql.clone());
        let mut rows = self.rows.lock().unwrap();
        if statement.sql.starts_with("DELETE") {
            let removed =
                statement.params.iter().filter(|id| rows.remove(&text(id)).is_some()).count();
            return Ok(removed as u64);
        }
        if self.drop_writes.load(Ordering::SeqCst) {
            return Ok(1);
        }
        let id = text(&statement.params[0]);
        let state = text(&statement.params[1]);
        let now = integer(&statement.params[2]);
        let preserve_created = statement.sql.contains("ON CONFLICT");
        let created_on = match rows.get(&id) {
            Some(existing) if preserve_created => existing.created_on,
            _ => now,
        };
        rows.insert(
            id.clone(),
            SessionRow {
                id,
                state,
                created_on,
                active_on: now,
            },
        );
        Ok(1)
    }

    fn query_session(&self, statement: &Statement) -> Result<Option<SessionRow>, DatabaseError> {
        self.log.lock().unwrap().push(statement.sql.clone());
        let id = text(&statement.params[0]);
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }
}

/// Expiry policy that rejects every session.
struct AlwaysExpired;

impl ExpiryPolicy for AlwaysExpired {
    fn is_expired(&self, _session: &Session, _now: Timestamp) -> bool {
        true
    }
}

/// Audit sink capturing events in memory.
#[derive(Default)]
struct RecordingSink {
    /// Captured events.
    events: Mutex<Vec<StateAuditEvent>>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<StateAuditKind> {
        self.events.lock().unwrap().iter().map(|event| event.kind).collect()
    }
}

impl StateAuditSink for RecordingSink {
    fn record(&self, event: &StateAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn store_over(database: &Arc<ScriptedDatabase>) -> StateStore {
    let handle: Arc<dyn SessionDatabase> = database.clone();
    StateStore::new(handle)
}

fn context_substates() -> Vec<String> {
    vec!["context".to_string()]
}

// ============================================================================
// SECTION: get_state
// ============================================================================

#[tokio::test]
async fn get_state_creates_default_document_for_unseen_id() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database);
    let id = StateId::new("conv1");

    let state = store.get_state(&id).await.expect("get state");

    assert_eq!(Value::Object(state), json!({ "_stateId": "conv1" }));
    let log = database.log();
    assert_eq!(log.len(), 3, "select, upsert, select");
    assert!(log[0].starts_with("SELECT"));
    assert!(log[1].starts_with("INSERT"));
    assert!(log[2].starts_with("SELECT"));
}

#[tokio::test]
async fn get_state_existing_session_reads_once() {
    let database = Arc::new(ScriptedDatabase::standard());
    database.insert_raw("conv1", r#"{"turn":3}"#, 10, 20);
    let store = store_over(&database);

    let state = store.get_state(&StateId::new("conv1")).await.expect("get state");

    assert_eq!(Value::Object(state), json!({ "turn": 3 }));
    assert_eq!(database.log().len(), 1);
}

#[tokio::test]
async fn get_state_rejects_blank_id_without_io() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database);

    let result = store.get_state(&StateId::new("  ")).await;

    assert!(matches!(result, Err(StateStoreError::InvalidState(_))));
    assert!(database.log().is_empty());
}

#[tokio::test]
async fn get_state_reports_corrupt_rows() {
    let database = Arc::new(ScriptedDatabase::lite());
    database.insert_raw("conv1", "[1,2,3]", 10, 20);
    database.insert_raw("conv2", "not json", 10, 20);
    let store = store_over(&database);

    let array = store.get_state(&StateId::new("conv1")).await;
    let garbage = store.get_state(&StateId::new("conv2")).await;

    assert!(matches!(array, Err(StateStoreError::Corrupt(_))));
    assert!(matches!(garbage, Err(StateStoreError::Corrupt(_))));
}

#[tokio::test]
async fn get_state_recreates_idle_sessions() {
    let database = Arc::new(ScriptedDatabase::standard());
    database.insert_raw("conv1", r#"{"turn":9}"#, 0, 0);
    let store = store_over(&database)
        .with_expiry(Arc::new(IdleTimeoutExpiry::new(std::time::Duration::from_millis(500))));

    let state = store.get_state(&StateId::new("conv1")).await.expect("get state");

    assert_eq!(Value::Object(state), json!({ "_stateId": "conv1" }));
    let row = database.row("conv1").expect("row");
    assert_eq!(row.active_on, 1_000);
}

#[tokio::test]
async fn get_state_fails_with_expiry_loop_for_always_expired_policy() {
    let database = Arc::new(ScriptedDatabase::lite());
    let sink = Arc::new(RecordingSink::default());
    let store = store_over(&database).with_expiry(Arc::new(AlwaysExpired)).with_audit(sink.clone());

    let result = store.get_state(&StateId::new("conv1")).await;

    assert_eq!(
        result,
        Err(StateStoreError::ExpiryLoop {
            state_id: "conv1".to_string(),
            attempts: 3,
        })
    );
    assert_eq!(
        sink.kinds(),
        vec![
            StateAuditKind::SessionCreated,
            StateAuditKind::SessionRecreated,
            StateAuditKind::ReadRetryExhausted,
        ]
    );
}

#[tokio::test]
async fn get_state_fails_with_transient_error_when_writes_vanish() {
    let database = Arc::new(ScriptedDatabase::lite());
    database.drop_writes.store(true, Ordering::SeqCst);
    let store = store_over(&database).with_config(StateStoreConfig {
        max_read_attempts: 2,
        ..StateStoreConfig::default()
    });

    let result = store.get_state(&StateId::new("conv1")).await;

    assert_eq!(
        result,
        Err(StateStoreError::TransientState {
            state_id: "conv1".to_string(),
            attempts: 2,
        })
    );
    let selects = database.log().iter().filter(|sql| sql.starts_with("SELECT")).count();
    assert_eq!(selects, 2);
}

#[tokio::test]
async fn low_read_ceilings_are_raised_to_minimum() {
    let database = Arc::new(ScriptedDatabase::lite());
    database.insert_raw("conv1", "{}", 1, 1);
    let store = store_over(&database).with_config(StateStoreConfig {
        max_read_attempts: 0,
        ..StateStoreConfig::default()
    });

    assert_eq!(store.config().max_read_attempts, MIN_READ_ATTEMPTS);
    let state = store.get_state(&StateId::new("conv1")).await.expect("get state");
    assert!(state.is_empty());
}

#[tokio::test]
async fn ceiling_of_one_still_creates_unseen_session() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database).with_config(StateStoreConfig {
        max_read_attempts: 1,
        ..StateStoreConfig::default()
    });
    let id = StateId::new("conv1");

    let state = store.get_state(&id).await.expect("get state");

    assert_eq!(Value::Object(state), json!({ "_stateId": "conv1" }));
    assert!(database.row("conv1").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_first_reads_create_one_session() {
    let database = Arc::new(ScriptedDatabase::standard());
    let store = store_over(&database);
    let id = StateId::new("conv1");

    let left = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.get_state(&id).await }
    });
    let right = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.get_state(&id).await }
    });
    let left = left.await.expect("join").expect("first reader");
    let right = right.await.expect("join").expect("second reader");

    let expected = json!({ "_stateId": "conv1" });
    assert_eq!(Value::Object(left), expected);
    assert_eq!(Value::Object(right), expected);
    assert_eq!(database.rows.lock().unwrap().len(), 1);
}

// ============================================================================
// SECTION: set_state
// ============================================================================

#[tokio::test]
async fn set_state_then_get_state_round_trips_nested_documents() {
    let database = Arc::new(ScriptedDatabase::standard());
    let store = store_over(&database);
    let id = StateId::new("conv1");
    let document = json!({ "a": { "b": [1, 2, 3] }, "flag": true, "name": null });

    store.set_state(&id, Some(document.clone())).await.expect("set state");
    let loaded = store.get_state(&id).await.expect("get state");

    assert_eq!(Value::Object(loaded), document);
}

#[tokio::test]
async fn set_state_none_stores_default_document() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database);
    let id = StateId::new("conv1");

    store.set_state(&id, None).await.expect("set none");
    let from_none = database.row("conv1").expect("row").state;
    store.set_state(&id, Some(json!({ "_stateId": "conv1" }))).await.expect("set default");
    let from_default = database.row("conv1").expect("row").state;

    assert_eq!(from_none, from_default);
    assert_eq!(from_none, r#"{"_stateId":"conv1"}"#);
}

#[tokio::test]
async fn set_state_rejects_non_objects_without_touching_rows() {
    let database = Arc::new(ScriptedDatabase::lite());
    database.insert_raw("conv1", r#"{"keep":1}"#, 5, 5);
    let store = store_over(&database);
    let id = StateId::new("conv1");

    let number = store.set_state(&id, Some(json!(42))).await;
    let array = store.set_state(&id, Some(json!([1, 2, 3]))).await;

    assert!(matches!(number, Err(StateStoreError::InvalidState(message)) if message.contains("plain object")));
    assert!(matches!(array, Err(StateStoreError::InvalidState(_))));
    assert!(database.log().is_empty());
    assert_eq!(database.row("conv1").expect("row").state, r#"{"keep":1}"#);
}

#[tokio::test]
async fn set_state_enforces_size_limit() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database).with_config(StateStoreConfig {
        max_state_bytes: 16,
        ..StateStoreConfig::default()
    });

    let result =
        store.set_state(&StateId::new("conv1"), Some(json!({ "long": "x".repeat(32) }))).await;

    assert!(matches!(result, Err(StateStoreError::TooLarge { max_bytes: 16, .. })));
    assert!(database.row("conv1").is_none());
}

#[tokio::test]
async fn lite_dialect_resets_created_on_on_overwrite() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database);
    let id = StateId::new("conv1");

    store.set_state(&id, Some(json!({ "turn": 1 }))).await.expect("first write");
    database.advance(500);
    store.set_state(&id, Some(json!({ "turn": 2 }))).await.expect("second write");

    let row = database.row("conv1").expect("row");
    assert_eq!(store.dialect(), DialectFlavor::Lite);
    assert_eq!(row.created_on, 1_500);
    assert_eq!(row.active_on, 1_500);
}

#[tokio::test]
async fn standard_dialect_preserves_created_on_on_overwrite() {
    let database = Arc::new(ScriptedDatabase::standard());
    let store = store_over(&database);
    let id = StateId::new("conv1");

    store.set_state(&id, Some(json!({ "turn": 1 }))).await.expect("first write");
    database.advance(500);
    store.set_state(&id, Some(json!({ "turn": 2 }))).await.expect("second write");

    let session = store.session(&id).await.expect("session").expect("present");
    assert_eq!(store.dialect(), DialectFlavor::Standard);
    assert_eq!(session.created_on, Timestamp::from_unix_millis(1_000));
    assert_eq!(session.active_on, Timestamp::from_unix_millis(1_500));
    assert_eq!(Value::Object(session.state), json!({ "turn": 2 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writers_leave_one_complete_document() {
    let database = Arc::new(ScriptedDatabase::standard());
    let store = store_over(&database);
    let id = StateId::new("conv1");
    let first = json!({ "writer": 1, "payload": [1, 1, 1] });
    let second = json!({ "writer": 2, "payload": [2, 2] });

    let (left, right) = tokio::join!(
        store.set_state(&id, Some(first.clone())),
        store.set_state(&id, Some(second.clone()))
    );
    left.expect("first writer");
    right.expect("second writer");

    let loaded = Value::Object(store.get_state(&id).await.expect("get state"));
    assert!(loaded == first || loaded == second, "unexpected merge: {loaded}");
}

// ============================================================================
// SECTION: delete_state
// ============================================================================

#[tokio::test]
async fn delete_state_removes_parent_and_context() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database);
    let id = StateId::new("conv1");
    store.set_state(&id, Some(json!({ "turn": 4 }))).await.expect("set parent");
    store.set_state(&id.substate("context"), None).await.expect("set context");

    let removed = store.delete_state(&id, &context_substates()).await.expect("delete");

    assert_eq!(removed, 2);
    assert!(database.row("conv1").is_none());
    assert!(database.row("conv1___context").is_none());
    let state = store.get_state(&id).await.expect("get after delete");
    assert_eq!(Value::Object(state), json!({ "_stateId": "conv1" }));
}

#[tokio::test]
async fn delete_state_with_default_substates_uses_context() {
    let database = Arc::new(ScriptedDatabase::standard());
    let store = store_over(&database);
    let id = StateId::new("conv1");
    store.set_state(&id, None).await.expect("set parent");
    store.set_state(&id.substate("context"), None).await.expect("set context");

    let removed = store.delete_state_with_default_substates(&id).await.expect("delete");

    assert_eq!(removed, 2);
}

#[tokio::test]
async fn delete_state_without_substates_keeps_context() {
    let database = Arc::new(ScriptedDatabase::lite());
    let store = store_over(&database);
    let id = StateId::new("conv1");
    store.set_state(&id, None).await.expect("set parent");
    store.set_state(&id.substate("context"), None).await.expect("set context");

    let removed = store.delete_state(&id, &[]).await.expect("delete");

    assert_eq!(removed, 1);
    assert!(database.row("conv1").is_none());
    assert!(database.row("conv1___context").is_some());
}

#[tokio::test]
async fn delete_state_twice_is_not_an_error() {
    let database = Arc::new(ScriptedDatabase::lite());
    let sink = Arc::new(RecordingSink::default());
    let store = store_over(&database).with_audit(sink.clone());
    let id = StateId::new("conv1");
    store.set_state(&id, None).await.expect("set");

    let first = store.delete_state(&id, &context_substates()).await.expect("first delete");
    let second = store.delete_state(&id, &context_substates()).await.expect("second delete");

    assert_eq!((first, second), (1, 0));
    let rows: Vec<Option<u64>> = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|event| event.kind == StateAuditKind::StateDeleted)
        .map(|event| event.rows)
        .collect();
    assert_eq!(rows, vec![Some(1), Some(0)]);
}
