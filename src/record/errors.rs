//! Record validation errors
//!
//! Every variant is fatal: the validation call stops at the first one and
//! returns no partial result. Recoverable conditions (meta function
//! failures, global-format fallbacks) are logged instead.

use serde_json::Value;
use thiserror::Error;

use crate::schema::FieldRejection;

/// Result type for record validation
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for record store lookups
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a record store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),
}

/// Fatal record validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Required key absent from the input
    #[error("Missing required property '{field}'")]
    MissingRequired { field: String },

    /// Unique field supplied without a usable value
    #[error("Please provide a unique value for '{field}'")]
    MissingUnique { field: String },

    /// Another record already holds the unique value
    #[error("A duplicate item was found with '{field}={value}'")]
    Duplicate { field: String, value: String },

    /// Type function rejected the value
    #[error("Failed to validate '{field}': {value}: {cause}")]
    InvalidField {
        field: String,
        value: String,
        #[source]
        cause: FieldRejection,
    },

    /// Duplicate lookup failed
    #[error("Duplicate lookup for '{field}' failed: {cause}")]
    Store {
        field: String,
        #[source]
        cause: StoreError,
    },

    /// Unique field declared but no store to check it against
    #[error("No record store configured to check unique field '{field}'")]
    StoreUnavailable { field: String },
}

impl RecordError {
    pub fn missing_required(field: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
        }
    }

    pub fn missing_unique(field: impl Into<String>) -> Self {
        Self::MissingUnique {
            field: field.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: Option<&Value>) -> Self {
        Self::Duplicate {
            field: field.into(),
            value: display_value(value),
        }
    }

    pub fn invalid_field(field: impl Into<String>, value: Option<&Value>, cause: FieldRejection) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: display_value(value),
            cause,
        }
    }

    /// The offending field path
    pub fn field(&self) -> &str {
        match self {
            Self::MissingRequired { field }
            | Self::MissingUnique { field }
            | Self::Duplicate { field, .. }
            | Self::InvalidField { field, .. }
            | Self::Store { field, .. }
            | Self::StoreUnavailable { field } => field,
        }
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRequired { .. } => "RECORD_MISSING_REQUIRED",
            Self::MissingUnique { .. } => "RECORD_MISSING_UNIQUE",
            Self::Duplicate { .. } => "RECORD_DUPLICATE",
            Self::InvalidField { .. } => "RECORD_INVALID_FIELD",
            Self::Store { .. } => "RECORD_STORE_ERROR",
            Self::StoreUnavailable { .. } => "RECORD_STORE_UNAVAILABLE",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingRequired { .. } | Self::MissingUnique { .. } | Self::InvalidField { .. } => 400,
            Self::Duplicate { .. } => 409,
            Self::Store { .. } | Self::StoreUnavailable { .. } => 500,
        }
    }
}

/// Renders a raw input value for error messages; strings are unquoted.
pub(crate) fn display_value(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(RecordError::missing_required("name").status_code(), 400);
        assert_eq!(RecordError::duplicate("name", Some(&json!("Acme"))).status_code(), 409);
        assert_eq!(
            RecordError::StoreUnavailable { field: "name".into() }.status_code(),
            500
        );
    }

    #[test]
    fn test_duplicate_message_names_value() {
        let err = RecordError::duplicate("name", Some(&json!("Acme")));
        assert_eq!(err.to_string(), "A duplicate item was found with 'name=Acme'");
        assert_eq!(err.field(), "name");
    }

    #[test]
    fn test_invalid_field_carries_cause() {
        let err = RecordError::invalid_field(
            "age",
            Some(&json!({"n": 1})),
            FieldRejection::new("expected number, got object"),
        );
        let display = err.to_string();
        assert!(display.contains("age"));
        assert!(display.contains("{\"n\":1}"));
        assert!(display.contains("expected number"));
        assert_eq!(err.code(), "RECORD_INVALID_FIELD");
    }

    #[test]
    fn test_absent_value_rendering() {
        assert_eq!(display_value(None), "undefined");
        assert_eq!(display_value(Some(&json!(3))), "3");
    }
}
