//! # Type Registry
//!
//! Named type functions available to schema documents.

use std::collections::HashMap;

use super::errors::{SchemaError, SchemaResult};
use super::validators::{BuiltinType, TypeRef};

/// Registry of type functions by name
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeRef>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let mut types = HashMap::new();
        for builtin in BuiltinType::ALL {
            types.insert(builtin.type_name().to_string(), builtin.handle());
        }
        Self { types }
    }

    /// Create a registry with no types at all
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Register a type function under its own name
    pub fn register(&mut self, validator: TypeRef) -> SchemaResult<()> {
        let name = validator.name().to_string();
        if self.types.contains_key(&name) {
            return Err(SchemaError::DuplicateType(name));
        }
        self.types.insert(name, validator);
        Ok(())
    }

    /// Get a type function by name
    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).cloned()
    }

    /// Resolve the type for `field`, failing on unknown names
    pub fn resolve(&self, field: &str, type_name: &str) -> SchemaResult<TypeRef> {
        self.get(type_name).ok_or_else(|| SchemaError::UnknownType {
            field: field.to_string(),
            type_name: type_name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
