//! CLI module for aerorecord
//!
//! Provides command-line interface for:
//! - validate: Validate one JSON record from stdin against a collection schema
//! - check-schema: Load every schema document and summarize it

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_schema, run, run_command, schema_summary, validate, validate_record, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_envelope, ok_envelope, parse_request, read_request, write_error, write_response};
