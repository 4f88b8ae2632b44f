//! Field descriptor model
//!
//! Schema entries are resolved once, when the schema is built or loaded,
//! into a tagged shape:
//! - `Wildcard`: copy the input through verbatim
//! - `Scalar`: leaf field checked by a type function
//! - `Object`: nested sub-schema
//! - `Array`: nested array schema, one schema per declared slot
//!
//! Meta fields are tagged explicitly with [`SchemaEntry::Meta`] and are
//! never validated as data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validators::{BuiltinType, MetaFnRef, TypeRef};

/// String casing applied to validated string values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Casing {
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default)]
    pub uppercase: bool,
}

impl Casing {
    pub fn lowercase() -> Self {
        Self {
            lowercase: true,
            uppercase: false,
        }
    }

    pub fn uppercase() -> Self {
        Self {
            lowercase: false,
            uppercase: true,
        }
    }

    /// True when no casing is declared
    pub fn is_empty(&self) -> bool {
        !self.lowercase && !self.uppercase
    }

    /// Apply the casing. Lowercase wins when both are set; non-strings
    /// pass through unchanged.
    pub fn apply(&self, value: Value) -> Value {
        match value {
            Value::String(s) if self.lowercase => Value::String(s.to_lowercase()),
            Value::String(s) if self.uppercase => Value::String(s.to_uppercase()),
            other => other,
        }
    }
}

/// Resolved type of a data field
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Copied through verbatim (`*`)
    Wildcard,
    /// Leaf value checked by a type function
    Scalar(TypeRef),
    /// Nested object with its own schema
    Object(Schema),
    /// Nested array; element 0 is the element schema, the length is the
    /// number of slots materialized when the input omits the array
    Array(Vec<Schema>),
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &str {
        match self {
            FieldType::Wildcard => "*",
            FieldType::Scalar(validator) => validator.name(),
            FieldType::Object(_) => "object",
            FieldType::Array(_) => "array",
        }
    }
}

/// Normalized rule set for one data field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The type used to validate the field
    pub field_type: FieldType,
    /// Whether the key must be present in the input
    pub required: bool,
    /// Value assigned when the key is absent
    pub default: Option<Value>,
    /// Whether no other record may share the value
    pub unique: bool,
    /// Related collection, informational only
    pub reference: Option<String>,
    /// Per-field string casing
    pub casing: Casing,
}

impl FieldDescriptor {
    /// Create an optional field of the given type
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
            unique: false,
            reference: None,
            casing: Casing::default(),
        }
    }

    /// Leaf field validated by `validator`
    pub fn of(validator: TypeRef) -> Self {
        Self::new(FieldType::Scalar(validator))
    }

    pub fn string() -> Self {
        Self::of(BuiltinType::String.handle())
    }

    pub fn number() -> Self {
        Self::of(BuiltinType::Number.handle())
    }

    pub fn integer() -> Self {
        Self::of(BuiltinType::Integer.handle())
    }

    pub fn boolean() -> Self {
        Self::of(BuiltinType::Boolean.handle())
    }

    pub fn date() -> Self {
        Self::of(BuiltinType::Date.handle())
    }

    /// Pass-through field
    pub fn wildcard() -> Self {
        Self::new(FieldType::Wildcard)
    }

    /// Nested object field
    pub fn object(schema: Schema) -> Self {
        Self::new(FieldType::Object(schema))
    }

    /// Nested array field with the given slot schemas
    pub fn array(slots: Vec<Schema>) -> Self {
        Self::new(FieldType::Array(slots))
    }

    /// Nested array field whose elements all follow `element`
    pub fn array_of(element: Schema) -> Self {
        Self::array(vec![element])
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn references(mut self, collection: impl Into<String>) -> Self {
        self.reference = Some(collection.into());
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.casing.lowercase = true;
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.casing.uppercase = true;
        self
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.field_type, FieldType::Wildcard)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.field_type, FieldType::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.field_type, FieldType::Object(_))
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn has_formatting(&self) -> bool {
        !self.casing.is_empty()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Where a meta field takes its value from
#[derive(Debug, Clone)]
pub enum MetaSource {
    /// Name of a validated field; the literal is used when the record
    /// has no such field
    Reference(String),
    /// Validated values of the named fields, appended in order
    Concat(Vec<String>),
    /// Fixed value. A string value behaves like [`MetaSource::Reference`].
    Static(Value),
    /// Computed from the validated record
    Computed(MetaFnRef),
}

/// A field resolved after all data fields, composing a metadata label.
#[derive(Debug, Clone)]
pub struct MetaDescriptor {
    /// Readable label; falls back to the reference name
    pub name: Option<String>,
    pub source: MetaSource,
}

impl MetaDescriptor {
    /// Meta referring to another field by name
    pub fn reference(field: impl Into<String>) -> Self {
        Self {
            name: None,
            source: MetaSource::Reference(field.into()),
        }
    }

    /// Labelled meta with an explicit source
    pub fn labelled(name: impl Into<String>, source: MetaSource) -> Self {
        Self {
            name: Some(name.into()),
            source,
        }
    }

    pub fn concat<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::labelled(
            name,
            MetaSource::Concat(fields.into_iter().map(Into::into).collect()),
        )
    }

    pub fn fixed(name: impl Into<String>, value: Value) -> Self {
        Self::labelled(name, MetaSource::Static(value))
    }

    pub fn computed(name: impl Into<String>, func: MetaFnRef) -> Self {
        Self::labelled(name, MetaSource::Computed(func))
    }

    /// The human-facing label, if the meta has one
    pub fn readable(&self) -> Option<&str> {
        match (&self.name, &self.source) {
            (Some(name), _) => Some(name.as_str()),
            (None, MetaSource::Reference(field)) => Some(field.as_str()),
            _ => None,
        }
    }
}

/// One declared schema key
#[derive(Debug, Clone)]
pub enum SchemaEntry {
    Field(FieldDescriptor),
    Meta(MetaDescriptor),
}

/// Record schema: ordered field mapping, or a single type function for
/// primitive sub-schemas such as array elements.
#[derive(Debug, Clone)]
pub enum Schema {
    Fields(Vec<(String, SchemaEntry)>),
    Single(TypeRef),
}

impl Default for Schema {
    fn default() -> Self {
        Schema::Fields(Vec::new())
    }
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Schema with no fields
    pub fn empty() -> Self {
        Self::default()
    }

    /// Primitive schema validated by one type function
    pub fn single(validator: TypeRef) -> Self {
        Schema::Single(validator)
    }

    /// Declared entries in order; empty for single-value schemas
    pub fn entries(&self) -> &[(String, SchemaEntry)] {
        match self {
            Schema::Fields(entries) => entries,
            Schema::Single(_) => &[],
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.entries()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
    }

    /// Data field descriptor by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        match self.get(name)? {
            SchemaEntry::Field(field) => Some(field),
            SchemaEntry::Meta(_) => None,
        }
    }

    /// Meta descriptor by name
    pub fn meta(&self, name: &str) -> Option<&MetaDescriptor> {
        match self.get(name)? {
            SchemaEntry::Meta(meta) => Some(meta),
            SchemaEntry::Field(_) => None,
        }
    }

    pub fn is_meta(&self, name: &str) -> bool {
        self.meta(name).is_some()
    }

    /// Names of fields marked unique, in declaration order
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.entries().iter().filter_map(|(key, entry)| match entry {
            SchemaEntry::Field(field) if field.unique => Some(key.as_str()),
            _ => None,
        })
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Schema::Single(_))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Builder preserving declaration order
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entries: Vec<(String, SchemaEntry)>,
}

impl SchemaBuilder {
    /// Declare a data field. Re-declaring a key replaces it in place.
    pub fn field(self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.entry(name.into(), SchemaEntry::Field(field))
    }

    /// Declare a meta field
    pub fn meta(self, name: impl Into<String>, meta: MetaDescriptor) -> Self {
        self.entry(name.into(), SchemaEntry::Meta(meta))
    }

    fn entry(mut self, name: String, entry: SchemaEntry) -> Self {
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((name, entry)),
        }
        self
    }

    pub fn build(self) -> Schema {
        Schema::Fields(self.entries)
    }
}

/// A schema bound to its collection, as loaded from a schema document.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    /// Collection name used for identifiers and metadata labels
    pub collection: String,
    /// Field schema
    pub schema: Schema,
    /// Global casing directive applied to every leaf field
    pub format: Option<Casing>,
}

impl CollectionSchema {
    pub fn new(collection: impl Into<String>, schema: Schema) -> Self {
        Self {
            collection: collection.into(),
            schema,
            format: None,
        }
    }

    pub fn with_format(mut self, format: Casing) -> Self {
        self.format = Some(format);
        self
    }
}
