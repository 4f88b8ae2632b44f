//! Schema loading errors
//!
//! All schema errors are raised while building or loading schemas, never
//! while validating a record.

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Schema document could not be read or parsed
    #[error("Malformed schema document '{path}': {reason}")]
    Malformed { path: String, reason: String },

    /// Field names a type the registry does not know
    #[error("Unknown type '{type_name}' for field '{field}'")]
    UnknownType { field: String, type_name: String },

    /// Field entry has an unsupported shape
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Type name registered twice
    #[error("Type '{0}' is already registered")]
    DuplicateType(String),

    /// Collection loaded twice
    #[error("Schema for collection '{0}' is already loaded")]
    DuplicateCollection(String),
}

impl SchemaError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "SCHEMA_MALFORMED",
            Self::UnknownType { .. } => "SCHEMA_UNKNOWN_TYPE",
            Self::InvalidField { .. } => "SCHEMA_INVALID_FIELD",
            Self::DuplicateType(_) => "SCHEMA_DUPLICATE_TYPE",
            Self::DuplicateCollection(_) => "SCHEMA_DUPLICATE_COLLECTION",
        }
    }
}
