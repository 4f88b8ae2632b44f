//! # Duplicate Checker
//!
//! Unique fields are checked against an external [`RecordStore`] with a
//! single equality query. A match only counts as a duplicate when its
//! identifier differs from the `_id` of the record being validated, so an
//! update never conflicts with itself.
//!
//! Lookups are read-only and best-effort: two concurrent inserts of the same
//! value are not serialized here. The backing store's own constraint has to
//! catch that race.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::schema::{BoxFuture, Schema};

use super::context::ValidationContext;
use super::errors::{RecordError, RecordResult, StoreError, StoreResult};

/// Key holding a record's identifier
pub const ID_FIELD: &str = "_id";

/// A store hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredMatch {
    /// The store resolved the query to one record
    Direct(String),
    /// Candidate records; the first one decides
    Candidates(Vec<Option<String>>),
}

impl StoredMatch {
    /// Identifier of the conflicting record, when the store knows it
    pub fn conflicting_id(&self) -> Option<&str> {
        match self {
            StoredMatch::Direct(id) => Some(id),
            StoredMatch::Candidates(items) => items.first().and_then(|id| id.as_deref()),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, StoredMatch::Candidates(items) if items.is_empty())
    }
}

/// External store answering duplicate lookups
pub trait RecordStore: Send + Sync {
    /// Find a record of `collection` matching every `field = value` pair of
    /// `query`. Returns `None` when nothing conflicts.
    fn find_conflict<'a>(
        &'a self,
        schema: &'a Schema,
        query: &'a Map<String, Value>,
        collection: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<StoredMatch>>>;
}

/// Returns true when another record already holds `key`'s value.
pub async fn is_duplicate(ctx: &ValidationContext<'_>, key: &str) -> RecordResult<bool> {
    let store = ctx.store.ok_or_else(|| RecordError::StoreUnavailable {
        field: ctx.field_path(key),
    })?;

    let mut query = Map::new();
    query.insert(
        key.to_string(),
        ctx.body_value(key).cloned().unwrap_or(Value::Null),
    );

    let found = store
        .find_conflict(ctx.schema, &query, ctx.collection)
        .await
        .map_err(|cause| RecordError::Store {
            field: ctx.field_path(key),
            cause,
        })?;

    let Some(found) = found.filter(|m| !m.is_empty()) else {
        debug!(collection = ctx.collection, field = key, "no conflicting record");
        return Ok(false);
    };

    let own_id = ctx.record_id();
    let duplicate = match (found.conflicting_id(), own_id.as_deref()) {
        (Some(other), Some(own)) => other != own,
        // A hit whose identity cannot be compared is a conflict
        _ => true,
    };

    debug!(
        collection = ctx.collection,
        field = key,
        conflicting_id = found.conflicting_id(),
        duplicate,
        "duplicate lookup"
    );
    Ok(duplicate)
}

/// A record held by [`MemoryRecordStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Record identifier
    pub key: String,
    /// Validated fields
    pub validated: Value,
    /// Metadata labels, searchable through meta-field queries
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl StoredRecord {
    pub fn new(key: impl Into<String>, validated: Value) -> Self {
        Self {
            key: key.into(),
            validated,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    fn matches(&self, schema: &Schema, query: &Map<String, Value>) -> bool {
        query.iter().all(|(field, expected)| {
            // Label shortcut: meta keys are answered from stored metadata
            let actual = if schema.is_meta(field) {
                self.metadata.get(field)
            } else {
                self.validated.get(field)
            };
            actual == Some(expected)
        })
    }
}

/// In-memory store, used for tests and the command line front-end.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record by key
    pub fn insert(&self, collection: &str, record: StoredRecord) -> StoreResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".into()))?;

        let bucket = records.entry(collection.to_string()).or_default();
        match bucket.iter_mut().find(|r| r.key == record.key) {
            Some(existing) => *existing = record,
            None => bucket.push(record),
        }
        Ok(())
    }

    /// Remove a record by key, returning whether it existed
    pub fn remove(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".into()))?;

        let Some(bucket) = records.get_mut(collection) else {
            return Ok(false);
        };
        let before = bucket.len();
        bucket.retain(|r| r.key != key);
        Ok(bucket.len() != before)
    }

    /// Number of records in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.records
            .read()
            .map(|records| records.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Keys of the records matching `query`
    pub fn find_matches(
        &self,
        schema: &Schema,
        query: &Map<String, Value>,
        collection: &str,
    ) -> StoreResult<Vec<String>> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".into()))?;

        Ok(records
            .get(collection)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|r| r.matches(schema, query))
                    .map(|r| r.key.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl RecordStore for MemoryRecordStore {
    fn find_conflict<'a>(
        &'a self,
        schema: &'a Schema,
        query: &'a Map<String, Value>,
        collection: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<StoredMatch>>> {
        let result = self.find_matches(schema, query, collection).map(|mut keys| {
            match keys.len() {
                0 => None,
                1 => keys.pop().map(StoredMatch::Direct),
                _ => Some(StoredMatch::Candidates(keys.into_iter().map(Some).collect())),
            }
        });
        Box::pin(std::future::ready(result))
    }
}
