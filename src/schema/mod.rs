//! Schema subsystem for aerorecord
//!
//! Schemas describe a record's fields and how each one is validated,
//! normalized and formatted.
//!
//! # Design Principles
//!
//! - Entries are resolved once into a tagged descriptor, never re-inspected
//!   by shape during validation
//! - Declaration order is preserved
//! - Meta fields are tagged explicitly, not inferred during validation
//! - Type functions may be synchronous or asynchronous

mod errors;
mod loader;
mod registry;
mod types;
pub mod validators;

pub use errors::{SchemaError, SchemaResult};
pub use loader::{is_legacy_meta_name, SchemaLoader, WILDCARD};
pub(crate) use loader::make_path;
pub use registry::TypeRegistry;
pub use types::{
    Casing, CollectionSchema, FieldDescriptor, FieldType, MetaDescriptor, MetaSource, Schema,
    SchemaBuilder, SchemaEntry,
};
pub use validators::{
    async_meta_fn, async_type, meta_fn, sync_type, Actor, BoxFuture, BuiltinType, FieldEnvelope,
    FieldInput, FieldRejection, MetaFnRef, MetaFunction, TypeRef, TypeValidator, ValidatorResult,
};
