//! Schema loader for declarative schema documents
//!
//! One JSON document per collection, stored as `<schema_dir>/*.json`:
//!
//! ```json
//! {
//!   "collection": "categories",
//!   "format": { "lowercase": true },
//!   "fields": {
//!     "name": { "type": "string", "required": true, "unique": true },
//!     "tags": ["string"],
//!     "address": { "city": "string" },
//!     "extra": "*",
//!     "label1": "name"
//!   }
//! }
//! ```
//!
//! Entries are resolved against a [`TypeRegistry`] at load time. Keys of the
//! form `label<digits>` and entries carrying `"meta": true` are meta fields.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};
use super::registry::TypeRegistry;
use super::types::{
    Casing, CollectionSchema, FieldDescriptor, FieldType, MetaDescriptor, MetaSource, Schema,
    SchemaEntry,
};

/// Wildcard type marker
pub const WILDCARD: &str = "*";

/// Schema loader that reads schema documents from disk and keeps them by
/// collection name.
pub struct SchemaLoader {
    /// Directory containing schema documents
    schema_dir: PathBuf,
    /// Type functions available to documents
    registry: TypeRegistry,
    /// Loaded schemas by collection
    schemas: HashMap<String, CollectionSchema>,
}

impl SchemaLoader {
    /// Creates a loader for `schema_dir` with the built-in types.
    pub fn new(schema_dir: &Path) -> Self {
        Self::with_registry(schema_dir, TypeRegistry::new())
    }

    /// Creates a loader resolving type names through `registry`.
    pub fn with_registry(schema_dir: &Path, registry: TypeRegistry) -> Self {
        Self {
            schema_dir: schema_dir.to_path_buf(),
            registry,
            schemas: HashMap::new(),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Loads every `.json` document in the schema directory.
    ///
    /// Files are loaded in name order so duplicate-collection errors are
    /// reported deterministically.
    pub fn load_all(&mut self) -> SchemaResult<usize> {
        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            SchemaError::malformed(
                self.schema_dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    self.schema_dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;

            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_schema_file(path)?;
        }

        Ok(paths.len())
    }

    /// Loads a single schema document.
    pub fn load_schema_file(&mut self, path: &Path) -> SchemaResult<&CollectionSchema> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path)
            .map_err(|e| SchemaError::malformed(&origin, format!("Failed to read file: {}", e)))?;

        let document: Value = serde_json::from_str(&content)
            .map_err(|e| SchemaError::malformed(&origin, format!("Invalid JSON: {}", e)))?;

        let schema = self.parse_document(&document, &origin)?;
        self.register(schema)
    }

    /// Registers a schema directly (for testing or programmatic creation).
    pub fn register(&mut self, schema: CollectionSchema) -> SchemaResult<&CollectionSchema> {
        if self.schemas.contains_key(&schema.collection) {
            return Err(SchemaError::DuplicateCollection(schema.collection));
        }
        let collection = schema.collection.clone();
        Ok(self.schemas.entry(collection).or_insert(schema))
    }

    /// Gets a schema by collection name.
    pub fn get(&self, collection: &str) -> Option<&CollectionSchema> {
        self.schemas.get(collection)
    }

    pub fn exists(&self, collection: &str) -> bool {
        self.schemas.contains_key(collection)
    }

    /// Loaded collection names, sorted
    pub fn collections(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Parses a schema document into a [`CollectionSchema`].
    pub fn parse_document(&self, document: &Value, origin: &str) -> SchemaResult<CollectionSchema> {
        let obj = document
            .as_object()
            .ok_or_else(|| SchemaError::malformed(origin, "document must be an object"))?;

        let collection = obj
            .get("collection")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SchemaError::malformed(origin, "missing 'collection'"))?;

        let fields = obj
            .get("fields")
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::malformed(origin, "missing 'fields' object"))?;

        let format = match obj.get("format") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value::<Casing>(value.clone())
                    .map_err(|e| SchemaError::malformed(origin, format!("Invalid format: {}", e)))?,
            ),
        };

        Ok(CollectionSchema {
            collection: collection.to_string(),
            schema: self.parse_fields(fields, "")?,
            format,
        })
    }

    /// Parses an object of field entries, keeping declaration order.
    pub fn parse_fields(&self, fields: &Map<String, Value>, prefix: &str) -> SchemaResult<Schema> {
        let mut entries = Vec::with_capacity(fields.len());
        for (name, raw) in fields {
            let path = make_path(prefix, name);
            entries.push((name.clone(), self.parse_entry(name, raw, &path)?));
        }
        Ok(Schema::Fields(entries))
    }

    fn parse_entry(&self, name: &str, raw: &Value, path: &str) -> SchemaResult<SchemaEntry> {
        let flagged_meta = raw
            .get("meta")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if flagged_meta || is_legacy_meta_name(name) {
            return parse_meta(raw, path).map(SchemaEntry::Meta);
        }

        self.parse_field(raw, path).map(SchemaEntry::Field)
    }

    fn parse_field(&self, raw: &Value, path: &str) -> SchemaResult<FieldDescriptor> {
        match raw {
            Value::Object(obj) => match obj.get("type").or_else(|| obj.get("value")) {
                Some(type_value) => {
                    let mut field = FieldDescriptor::new(self.parse_type(type_value, path)?);
                    field.required = bool_option(obj, "required", path)?;
                    field.unique = bool_option(obj, "unique", path)?;
                    field.default = obj.get("default").cloned();
                    field.reference = obj.get("ref").and_then(Value::as_str).map(str::to_string);
                    field.casing = Casing {
                        lowercase: bool_option(obj, "lowercase", path)?,
                        uppercase: bool_option(obj, "uppercase", path)?,
                    };
                    Ok(field)
                }
                // A bare object is a nested sub-schema
                None => Ok(FieldDescriptor::object(self.parse_fields(obj, path)?)),
            },
            other => Ok(FieldDescriptor::new(self.parse_type(other, path)?)),
        }
    }

    fn parse_type(&self, raw: &Value, path: &str) -> SchemaResult<FieldType> {
        match raw {
            Value::String(name) if name == WILDCARD => Ok(FieldType::Wildcard),
            Value::String(name) => Ok(FieldType::Scalar(self.registry.resolve(path, name)?)),
            Value::Array(slots) => {
                let mut schemas = Vec::with_capacity(slots.len());
                for (i, slot) in slots.iter().enumerate() {
                    schemas.push(self.parse_schema(slot, &format!("{}[{}]", path, i))?);
                }
                Ok(FieldType::Array(schemas))
            }
            Value::Object(obj) => Ok(FieldType::Object(self.parse_fields(obj, path)?)),
            other => Err(SchemaError::invalid_field(
                path,
                format!("unsupported type declaration {}", other),
            )),
        }
    }

    /// Parses an array slot: a type name or an object of fields.
    fn parse_schema(&self, raw: &Value, path: &str) -> SchemaResult<Schema> {
        match raw {
            Value::String(name) if name == WILDCARD => {
                Ok(Schema::single(self.registry.resolve(path, "any")?))
            }
            Value::String(name) => Ok(Schema::single(self.registry.resolve(path, name)?)),
            Value::Object(obj) => self.parse_fields(obj, path),
            other => Err(SchemaError::invalid_field(
                path,
                format!("unsupported array element declaration {}", other),
            )),
        }
    }
}

/// Legacy meta naming: `label` followed by one or more digits.
pub fn is_legacy_meta_name(name: &str) -> bool {
    name.strip_prefix("label")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn parse_meta(raw: &Value, path: &str) -> SchemaResult<MetaDescriptor> {
    let obj = match raw {
        Value::String(field) => return Ok(MetaDescriptor::reference(field.clone())),
        Value::Object(obj) => obj,
        Value::Null | Value::Array(_) => {
            return Err(SchemaError::invalid_field(path, "meta must be a string or object"))
        }
        other => return Ok(MetaDescriptor::fixed(other.to_string(), other.clone())),
    };

    let name = match obj.get("name") {
        None => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(_) => return Err(SchemaError::invalid_field(path, "'name' must be a string")),
    };

    let source = if let Some(Value::String(value)) = obj.get("value") {
        MetaSource::Static(Value::String(value.clone()))
    } else if let Some(concat) = obj.get("concat") {
        let fields = concat
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| SchemaError::invalid_field(path, "'concat' must be a list of field names"))?;
        MetaSource::Concat(fields)
    } else if let Some(value) = obj.get("value") {
        MetaSource::Static(value.clone())
    } else {
        // `{ "name": "x" }` alone refers to the field it names
        match &name {
            Some(name) => MetaSource::Reference(name.clone()),
            None => return Err(SchemaError::invalid_field(path, "meta needs a name or value")),
        }
    };

    Ok(MetaDescriptor { name, source })
}

fn bool_option(obj: &Map<String, Value>, key: &str, path: &str) -> SchemaResult<bool> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(SchemaError::invalid_field(path, format!("'{}' must be a boolean", key))),
    }
}

/// Creates a field path from prefix and field name.
pub(crate) fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
