//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use std::io;

use thiserror::Error;

use crate::record::{RecordError, StoreError};
use crate::schema::SchemaError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Schema documents failed to load
    SchemaError,
    /// No schema for the requested collection
    UnknownCollection,
    /// The record was rejected
    Rejected,
    /// Async runtime could not start
    RuntimeError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CLI_CONFIG_ERROR",
            Self::IoError => "CLI_IO_ERROR",
            Self::SchemaError => "CLI_SCHEMA_ERROR",
            Self::UnknownCollection => "CLI_UNKNOWN_COLLECTION",
            Self::Rejected => "CLI_RECORD_REJECTED",
            Self::RuntimeError => "CLI_RUNTIME_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug, Error)]
#[error("{}: {message}", .code.code())]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn unknown_collection(collection: &str) -> Self {
        Self::new(
            CliErrorCode::UnknownCollection,
            format!("No schema loaded for collection '{}'", collection),
        )
    }

    pub fn runtime_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RuntimeError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        Self::new(CliErrorCode::SchemaError, format!("{} ({})", e, e.code()))
    }
}

impl From<RecordError> for CliError {
    fn from(e: RecordError) -> Self {
        Self::new(CliErrorCode::Rejected, format!("{} ({})", e, e.code()))
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::config_error(format!("Failed to seed record store: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::unknown_collection("ghosts");
        assert_eq!(
            err.to_string(),
            "CLI_UNKNOWN_COLLECTION: No schema loaded for collection 'ghosts'"
        );
    }

    #[test]
    fn test_record_error_maps_to_rejected() {
        let err = CliError::from(RecordError::missing_required("name"));
        assert_eq!(err.code(), &CliErrorCode::Rejected);
        assert!(err.message().contains("RECORD_MISSING_REQUIRED"));
    }
}
