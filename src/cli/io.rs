//! JSON I/O handling for CLI
//!
//! - Input: one JSON document via stdin, possibly spanning lines
//! - Output: one JSON object per line via stdout
//! - Logs go to stderr only

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read a JSON record from stdin
pub fn read_request() -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

/// Parse one JSON document
pub fn parse_request(input: &str) -> CliResult<Value> {
    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    Ok(serde_json::from_str(input)?)
}

/// Read a JSON-lines file, skipping blank lines
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> CliResult<Vec<T>> {
    let file = File::open(path)
        .map_err(|e| CliError::config_error(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut items = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|e| {
            CliError::config_error(format!("{}:{}: {}", path.display(), lineno + 1, e))
        })?;
        items.push(item);
    }
    Ok(items)
}

/// Success envelope
pub fn ok_envelope(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

/// Error envelope
pub fn error_envelope(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&ok_envelope(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&error_envelope(code, message))
}

fn write_line(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
