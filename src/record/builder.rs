//! Record Builder
//!
//! Front door of the engine. `for_save` validates a new record and mints
//! its identifier; `for_update` validates an existing one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::schema::{Actor, CollectionSchema, Schema};

use super::context::{Validation, ValidationContext};
use super::duplicate::RecordStore;
use super::errors::RecordResult;
use super::format::GlobalFormat;
use super::pipeline;

/// Source of fresh record identifiers
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Output of [`RecordBuilder::for_save`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedRecord {
    /// `<collection>:<id>`, present when the builder has a collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub validated: Value,
    pub metadata: BTreeMap<String, String>,
}

/// Validates records of one collection
#[derive(Clone)]
pub struct RecordBuilder {
    collection: Option<String>,
    schema: Schema,
    formatting: Option<GlobalFormat>,
    store: Option<Arc<dyn RecordStore>>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for RecordBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBuilder")
            .field("collection", &self.collection)
            .field("schema", &self.schema)
            .field("formatting", &self.formatting)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl RecordBuilder {
    /// Builder for a named collection
    pub fn new(collection: impl Into<String>, schema: Schema) -> Self {
        Self {
            collection: Some(collection.into()),
            ..Self::anonymous(schema)
        }
    }

    /// Builder without a collection. `for_save` mints no identifier and
    /// metadata labels use an empty collection prefix.
    pub fn anonymous(schema: Schema) -> Self {
        Self {
            collection: None,
            schema,
            formatting: None,
            store: None,
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Builder for a loaded schema document, carrying its global casing
    pub fn from_collection(collection: &CollectionSchema) -> Self {
        let builder = Self::new(collection.collection.clone(), collection.schema.clone());
        match collection.format {
            Some(casing) => builder.with_formatting(GlobalFormat::from(casing)),
            None => builder,
        }
    }

    pub fn with_formatting(mut self, formatting: GlobalFormat) -> Self {
        self.formatting = Some(formatting);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate a new record and mint its identifier.
    pub async fn for_save(&self, body: &Value, actor: Option<&Actor>) -> RecordResult<SavedRecord> {
        let identifier = self.build_record_id();
        let Validation {
            validated,
            metadata,
        } = self.init(body, actor).await?;

        debug!(identifier = identifier.as_deref(), "record validated for save");
        Ok(SavedRecord {
            identifier,
            validated,
            metadata,
        })
    }

    /// Validate an existing record. The caller carries its identifier,
    /// normally as the body's `_id`.
    pub async fn for_update(&self, body: &Value, actor: Option<&Actor>) -> RecordResult<Validation> {
        self.init(body, actor).await
    }

    /// `<collection>:<id>`, or `None` without a collection
    pub fn build_record_id(&self) -> Option<String> {
        self.collection
            .as_ref()
            .map(|collection| format!("{}:{}", collection, self.ids.generate()))
    }

    async fn init(&self, body: &Value, actor: Option<&Actor>) -> RecordResult<Validation> {
        let ctx = ValidationContext::new(self.collection().unwrap_or(""), &self.schema, Some(body))
            .with_actor(actor)
            .with_formatting(self.formatting.as_ref())
            .with_store(self.store.as_deref());

        pipeline::run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MemoryRecordStore, RecordError, StoredRecord};
    use crate::schema::{sync_type, Casing, FieldDescriptor, FieldRejection, MetaDescriptor};
    use serde_json::json;

    struct FixedIds;

    impl IdGenerator for FixedIds {
        fn generate(&self) -> String {
            "fixed".to_string()
        }
    }

    fn categories() -> Schema {
        Schema::builder()
            .field("name", FieldDescriptor::string().required().unique())
            .field("email", FieldDescriptor::string().lowercase())
            .meta("label1", MetaDescriptor::reference("name"))
            .build()
    }

    #[tokio::test]
    async fn test_for_save_mints_identifier() {
        let store = Arc::new(MemoryRecordStore::new());
        let builder = RecordBuilder::new("categories", categories())
            .with_store(store)
            .with_id_generator(Arc::new(FixedIds));

        let saved = builder
            .for_save(&json!({ "name": "Acme", "email": "FOO@BAR.COM" }), None)
            .await
            .unwrap();

        assert_eq!(saved.identifier.as_deref(), Some("categories:fixed"));
        assert_eq!(saved.validated, json!({ "name": "Acme", "email": "foo@bar.com" }));
        assert_eq!(saved.metadata["label1"], "categories:name_Acme");
    }

    #[tokio::test]
    async fn test_uuid_identifier_shape() {
        let builder = RecordBuilder::new("things", Schema::empty());
        let id = builder.build_record_id().unwrap();
        let (collection, uuid) = id.split_once(':').unwrap();
        assert_eq!(collection, "things");
        assert!(Uuid::parse_str(uuid).is_ok());
        assert_ne!(builder.build_record_id(), builder.build_record_id());
    }

    #[tokio::test]
    async fn test_anonymous_builder_has_no_identifier() {
        let builder = RecordBuilder::anonymous(Schema::builder().field("a", FieldDescriptor::string()).build());
        let saved = builder.for_save(&json!({ "a": "x" }), None).await.unwrap();
        assert!(saved.identifier.is_none());
        assert_eq!(saved.validated, json!({ "a": "x" }));
    }

    #[tokio::test]
    async fn test_for_update_ignores_own_record() {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert("categories", StoredRecord::new("categories:1", json!({ "name": "Acme" })))
            .unwrap();
        let builder = RecordBuilder::new("categories", categories()).with_store(store);

        let out = builder
            .for_update(&json!({ "_id": "categories:1", "name": "Acme" }), None)
            .await
            .unwrap();
        assert_eq!(out.validated["name"], json!("Acme"));

        let err = builder.for_save(&json!({ "name": "Acme" }), None).await.unwrap_err();
        assert_eq!(err, RecordError::duplicate("name", Some(&json!("Acme"))));
    }

    #[tokio::test]
    async fn test_collection_format_applied() {
        let collection = CollectionSchema::new(
            "people",
            Schema::builder().field("city", FieldDescriptor::string()).build(),
        )
        .with_format(Casing::uppercase());
        let builder = RecordBuilder::from_collection(&collection);

        let out = builder.for_update(&json!({ "city": "oslo" }), None).await.unwrap();
        assert_eq!(out.validated, json!({ "city": "OSLO" }));
    }

    #[tokio::test]
    async fn test_single_schema_short_circuits() {
        let positive = sync_type("positive", |raw, _| match raw.and_then(Value::as_i64) {
            Some(n) if n > 0 => Ok(json!(n)),
            _ => Err(FieldRejection::new("expected a positive integer")),
        });
        let builder = RecordBuilder::new("counters", Schema::single(positive));

        let saved = builder.for_save(&json!(4), None).await.unwrap();
        assert_eq!(saved.validated, json!(4));
        assert!(saved.metadata.is_empty());

        let saved = builder.for_save(&json!(0), None).await.unwrap();
        assert_eq!(saved.validated, json!(0));

        assert!(builder.for_save(&json!(-1), None).await.is_err());
    }
}
