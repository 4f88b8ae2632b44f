//! Record Invariant Tests
//!
//! Behavior of the validation engine through the public API:
//! - Required and unique fields fail fast
//! - Duplicates are detected, updates never conflict with themselves
//! - Wildcards copy verbatim, arrays keep their declared arity
//! - Metadata labels read from the validated record
//! - Validation is deterministic

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aerorecord::record::{
    MemoryRecordStore, RecordBuilder, RecordError, RecordStore, StoreError, StoreResult,
    StoredMatch, StoredRecord,
};
use aerorecord::schema::{
    async_type, meta_fn, Actor, BoxFuture, FieldDescriptor, FieldInput, FieldRejection,
    MetaDescriptor, Schema,
};
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn company_schema() -> Schema {
    Schema::builder()
        .field("name", FieldDescriptor::string().required().unique())
        .field("email", FieldDescriptor::string().lowercase())
        .build()
}

fn company_builder(store: Arc<MemoryRecordStore>) -> RecordBuilder {
    RecordBuilder::new("companies", company_schema()).with_store(store)
}

/// Store that counts lookups and can be made to fail
struct CountingStore {
    inner: MemoryRecordStore,
    lookups: AtomicUsize,
    fail: bool,
}

impl CountingStore {
    fn new(fail: bool) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            lookups: AtomicUsize::new(0),
            fail,
        }
    }
}

impl RecordStore for CountingStore {
    fn find_conflict<'a>(
        &'a self,
        schema: &'a Schema,
        query: &'a Map<String, Value>,
        collection: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<StoredMatch>>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            let failed: StoreResult<Option<StoredMatch>> =
                Err(StoreError::Lookup("connection reset".into()));
            return Box::pin(std::future::ready(failed));
        }
        self.inner.find_conflict(schema, query, collection)
    }
}

// =============================================================================
// End-to-End Tests
// =============================================================================

/// The canonical example: email is lowercased, name kept.
#[tokio::test]
async fn test_acme_is_normalized() {
    let builder = company_builder(Arc::new(MemoryRecordStore::new()));

    let saved = builder
        .for_save(&json!({ "name": "Acme", "email": "FOO@BAR.COM" }), None)
        .await
        .unwrap();

    assert_eq!(saved.validated, json!({ "name": "Acme", "email": "foo@bar.com" }));
    assert!(saved.identifier.unwrap().starts_with("companies:"));
}

/// Missing required field names the field.
#[tokio::test]
async fn test_missing_name_is_fatal() {
    let builder = company_builder(Arc::new(MemoryRecordStore::new()));

    let err = builder
        .for_save(&json!({ "email": "x@y.com" }), None)
        .await
        .unwrap_err();

    assert_eq!(err.field(), "name");
    assert!(err.to_string().contains("name"));
}

// =============================================================================
// Duplicate Tests
// =============================================================================

/// A second record with the same unique value is rejected.
#[tokio::test]
async fn test_duplicate_rejected_on_save() {
    let store = Arc::new(MemoryRecordStore::new());
    store
        .insert("companies", StoredRecord::new("companies:1", json!({ "name": "Acme" })))
        .unwrap();
    let builder = company_builder(store);

    let err = builder
        .for_save(&json!({ "name": "Acme" }), None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RECORD_DUPLICATE");
    assert_eq!(err.status_code(), 409);
    assert_eq!(
        err.to_string(),
        "A duplicate item was found with 'name=Acme'"
    );
}

/// Updating a record with its own unique value is allowed.
#[tokio::test]
async fn test_update_does_not_conflict_with_itself() {
    let store = Arc::new(MemoryRecordStore::new());
    store
        .insert("companies", StoredRecord::new("companies:1", json!({ "name": "Acme" })))
        .unwrap();
    let builder = company_builder(store);

    let own = builder
        .for_update(&json!({ "_id": "companies:1", "name": "Acme" }), None)
        .await;
    assert!(own.is_ok());

    let other = builder
        .for_update(&json!({ "_id": "companies:2", "name": "Acme" }), None)
        .await;
    assert_eq!(other.unwrap_err().code(), "RECORD_DUPLICATE");
}

/// Duplicates are checked per collection.
#[tokio::test]
async fn test_duplicates_scoped_to_collection() {
    let store = Arc::new(MemoryRecordStore::new());
    store
        .insert("vendors", StoredRecord::new("vendors:1", json!({ "name": "Acme" })))
        .unwrap();

    let out = company_builder(store)
        .for_save(&json!({ "name": "Acme" }), None)
        .await;
    assert!(out.is_ok());
}

/// An empty unique value fails before the store is consulted.
#[tokio::test]
async fn test_empty_unique_value_skips_lookup() {
    let store = Arc::new(CountingStore::new(false));
    let builder = RecordBuilder::new("companies", company_schema()).with_store(store.clone());

    let err = builder.for_save(&json!({ "name": "" }), None).await.unwrap_err();
    assert_eq!(err, RecordError::missing_unique("name"));

    let err = builder.for_save(&json!({}), None).await.unwrap_err();
    assert_eq!(err, RecordError::missing_unique("name"));

    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

/// Store failures are fatal and not retried.
#[tokio::test]
async fn test_store_failure_is_fatal() {
    let store = Arc::new(CountingStore::new(true));
    let builder = RecordBuilder::new("companies", company_schema()).with_store(store.clone());

    let err = builder
        .for_save(&json!({ "name": "Acme" }), None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RECORD_STORE_ERROR");
    assert_eq!(err.status_code(), 500);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Pipeline Tests
// =============================================================================

/// Wildcard values are copied verbatim, whatever their shape.
#[tokio::test]
async fn test_wildcard_verbatim() {
    let schema = Schema::builder()
        .field("payload", FieldDescriptor::wildcard())
        .build();
    let builder = RecordBuilder::new("events", schema);

    let payload = json!({ "Deep": [1, "Two", { "three": null }] });
    let out = builder
        .for_update(&json!({ "payload": payload.clone() }), None)
        .await
        .unwrap();
    assert_eq!(out.validated["payload"], payload);
}

/// An absent array yields one element per declared slot.
#[tokio::test]
async fn test_absent_array_keeps_declared_arity() {
    let slot = Schema::builder()
        .field("amount", FieldDescriptor::number().with_default(json!(0)))
        .build();
    let schema = Schema::builder()
        .field("splits", FieldDescriptor::array(vec![slot.clone(), slot]))
        .build();
    let builder = RecordBuilder::new("invoices", schema);

    let out = builder.for_update(&json!({}), None).await.unwrap();
    assert_eq!(out.validated["splits"].as_array().unwrap().len(), 2);

    let out = builder
        .for_update(&json!({ "splits": [{ "amount": 1 }, { "amount": 2 }, { "amount": 3 }] }), None)
        .await
        .unwrap();
    assert_eq!(out.validated["splits"].as_array().unwrap().len(), 3);
}

/// Async validators see the actor passed explicitly to the builder.
#[tokio::test]
async fn test_async_validator_receives_actor() {
    let owner = async_type("owner", |input: FieldInput| async move {
        let actor = input
            .actor
            .and_then(|a| a.id)
            .ok_or_else(|| FieldRejection::new("anonymous callers cannot own records"))?;
        Ok::<_, FieldRejection>(input.value.unwrap_or_else(|| json!(actor)))
    });
    let schema = Schema::builder()
        .field("owner", FieldDescriptor::of(owner))
        .build();
    let builder = RecordBuilder::new("notes", schema);

    let actor = Actor::new("u42");
    let out = builder.for_save(&json!({}), Some(&actor)).await.unwrap();
    assert_eq!(out.validated["owner"], json!("u42"));

    let err = builder.for_save(&json!({}), None).await.unwrap_err();
    assert_eq!(err.code(), "RECORD_INVALID_FIELD");
}

// =============================================================================
// Metadata Tests
// =============================================================================

/// Concat appends validated values in order without a separator.
#[tokio::test]
async fn test_metadata_concat() {
    let schema = Schema::builder()
        .field("a", FieldDescriptor::string())
        .field("b", FieldDescriptor::string())
        .meta("label1", MetaDescriptor::concat("ab", ["a", "b"]))
        .build();
    let builder = RecordBuilder::new("pairs", schema);

    let out = builder
        .for_update(&json!({ "a": "x", "b": "y" }), None)
        .await
        .unwrap();
    assert_eq!(out.metadata["label1"], "pairs:ab_xy");
}

/// A reference meta reads the validated value, not its literal.
#[tokio::test]
async fn test_metadata_reference_reads_validated_value() {
    let schema = Schema::builder()
        .field("code", FieldDescriptor::string().uppercase())
        .meta("label1", MetaDescriptor::reference("code"))
        .build();
    let builder = RecordBuilder::new("items", schema);

    let out = builder.for_update(&json!({ "code": "ab1" }), None).await.unwrap();
    assert_eq!(out.metadata["label1"], "items:code_AB1");
    assert!(out.validated.get("label1").is_none());
}

/// Meta fields resolve after every data field, whatever their position.
#[tokio::test]
async fn test_metadata_declared_before_fields() {
    let schema = Schema::builder()
        .meta("label1", MetaDescriptor::concat("full", ["first", "last"]))
        .field("first", FieldDescriptor::string())
        .field("last", FieldDescriptor::string())
        .build();
    let builder = RecordBuilder::new("people", schema);

    let out = builder
        .for_update(&json!({ "first": "Ada", "last": "Lovelace" }), None)
        .await
        .unwrap();
    assert_eq!(out.metadata["label1"], "people:full_AdaLovelace");
}

/// A failing meta function drops only its own label.
#[tokio::test]
async fn test_meta_function_failure_is_recoverable() {
    let schema = Schema::builder()
        .field("name", FieldDescriptor::string())
        .meta(
            "score",
            MetaDescriptor::computed("score", meta_fn(|_, _| Err(FieldRejection::new("no score")))),
        )
        .meta("label1", MetaDescriptor::reference("name"))
        .build();
    let builder = RecordBuilder::new("teams", schema);

    let out = builder.for_update(&json!({ "name": "Reds" }), None).await.unwrap();
    assert!(!out.metadata.contains_key("score"));
    assert_eq!(out.metadata["label1"], "teams:name_Reds");
}

// =============================================================================
// Determinism Tests
// =============================================================================

/// forUpdate is idempotent given unchanged collaborators.
#[tokio::test]
async fn test_for_update_is_idempotent() {
    let schema = Schema::builder()
        .field("name", FieldDescriptor::string().required())
        .field("tags", FieldDescriptor::array_of(Schema::single(
            aerorecord::schema::BuiltinType::String.handle(),
        )))
        .meta("label1", MetaDescriptor::reference("name"))
        .build();
    let builder = RecordBuilder::new("posts", schema);
    let body = json!({ "name": "Hello", "tags": ["a", 1] });

    let first = builder.for_update(&body, None).await.unwrap();
    for _ in 0..50 {
        assert_eq!(builder.for_update(&body, None).await.unwrap(), first);
    }
}
