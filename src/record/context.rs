//! Validation Context
//!
//! Created fresh for every validation call and for every nested object or
//! array element. A nested context shares only read-only references with
//! its parent.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{make_path, Actor, MetaDescriptor, Schema};

use super::duplicate::{RecordStore, ID_FIELD};
use super::format::GlobalFormat;

/// Output of one validation call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
    /// Normalized record; an object for field schemas
    pub validated: Value,
    /// Derived metadata labels by meta key
    pub metadata: BTreeMap<String, String>,
}

/// State of one validation call
pub struct ValidationContext<'a> {
    /// Collection the record belongs to
    pub collection: &'a str,
    /// Schema being applied
    pub schema: &'a Schema,
    /// Raw input; `None` when validating against an absent value
    pub body: Option<&'a Value>,
    /// Requesting actor
    pub actor: Option<&'a Actor>,
    /// Global format hook
    pub formatting: Option<&'a GlobalFormat>,
    /// Store used for duplicate lookups
    pub store: Option<&'a dyn RecordStore>,
    /// Field path of this context inside the top-level record
    pub path: String,
    /// Fields validated so far
    pub validated: Map<String, Value>,
    /// Resolved metadata
    pub metadata: BTreeMap<String, String>,
    /// Meta fields deferred until all data fields are validated
    pub(crate) pending_meta: Vec<(&'a str, &'a MetaDescriptor)>,
}

impl<'a> ValidationContext<'a> {
    /// Create a top-level context
    pub fn new(collection: &'a str, schema: &'a Schema, body: Option<&'a Value>) -> Self {
        Self {
            collection,
            schema,
            body,
            actor: None,
            formatting: None,
            store: None,
            path: String::new(),
            validated: Map::new(),
            metadata: BTreeMap::new(),
            pending_meta: Vec::new(),
        }
    }

    pub fn with_actor(mut self, actor: Option<&'a Actor>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_formatting(mut self, formatting: Option<&'a GlobalFormat>) -> Self {
        self.formatting = formatting;
        self
    }

    pub fn with_store(mut self, store: Option<&'a dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    /// Fresh context for a nested schema at `segment` below this one.
    pub fn nested(&self, schema: &'a Schema, body: Option<&'a Value>, segment: &str) -> Self {
        Self {
            collection: self.collection,
            schema,
            body,
            actor: self.actor,
            formatting: self.formatting,
            store: self.store,
            path: segment.to_string(),
            validated: Map::new(),
            metadata: BTreeMap::new(),
            pending_meta: Vec::new(),
        }
    }

    /// Full path of `key` for error messages
    pub fn field_path(&self, key: &str) -> String {
        make_path(&self.path, key)
    }

    /// Path of this context itself, `$root` at the top
    pub fn own_path(&self) -> &str {
        if self.path.is_empty() {
            "$root"
        } else {
            &self.path
        }
    }

    /// Raw input value for `key`
    pub fn body_value(&self, key: &str) -> Option<&'a Value> {
        self.body.and_then(|body| body.get(key))
    }

    /// Whether the input carries `key`, even with a falsy value
    pub fn body_has(&self, key: &str) -> bool {
        self.body
            .and_then(Value::as_object)
            .is_some_and(|obj| obj.contains_key(key))
    }

    /// Identifier of the record being validated
    pub fn record_id(&self) -> Option<String> {
        match self.body_value(ID_FIELD)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub(crate) fn bookmark_meta(&mut self, key: &'a str, meta: &'a MetaDescriptor) {
        self.pending_meta.push((key, meta));
    }

    /// Finish the call
    pub fn into_validation(self) -> Validation {
        Validation {
            validated: Value::Object(self.validated),
            metadata: self.metadata,
        }
    }
}
