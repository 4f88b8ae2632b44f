//! CLI command implementations
//!
//! Each command loads the config file, installs logging, loads every
//! schema document from `schema_dir`, then does its work on a fresh tokio
//! runtime. Records read from stdin are validated once; nothing is
//! persisted.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::record::{MemoryRecordStore, RecordBuilder, RecordResult, StoredRecord};
use crate::schema::{Actor, Casing, SchemaLoader};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_json_lines, read_request, write_error, write_response};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one JSON schema document per collection (required)
    pub schema_dir: String,

    /// Casing applied to every leaf value of collections that declare no
    /// format of their own
    #[serde(default)]
    pub global_format: Option<Casing>,

    /// JSON-lines file of existing records, used for duplicate checks
    #[serde(default)]
    pub seed_records: Option<String>,

    /// Default tracing filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "warn".to_string()
}

/// One line of the seed file
#[derive(Debug, Clone, Deserialize)]
struct SeedRecord {
    collection: String,
    #[serde(flatten)]
    record: StoredRecord,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.schema_dir.trim().is_empty() {
            return Err(CliError::config_error("schema_dir must not be empty"));
        }

        EnvFilter::try_new(&self.log_filter).map_err(|e| {
            CliError::config_error(format!("Invalid log_filter '{}': {}", self.log_filter, e))
        })?;

        Ok(())
    }

    /// Get schema directory as Path
    pub fn schema_path(&self) -> &Path {
        Path::new(&self.schema_dir)
    }

    /// Get seed file path, if configured
    pub fn seed_path(&self) -> Option<PathBuf> {
        self.seed_records.as_ref().map(PathBuf::from)
    }

    /// Load every schema document
    pub fn load_schemas(&self) -> CliResult<SchemaLoader> {
        let mut loader = SchemaLoader::new(self.schema_path());
        let count = loader.load_all()?;
        info!(schema_dir = %self.schema_dir, count, "schemas loaded");
        Ok(loader)
    }

    /// Build the record store from the seed file
    pub fn load_store(&self) -> CliResult<MemoryRecordStore> {
        let store = MemoryRecordStore::new();
        let Some(path) = self.seed_path() else {
            return Ok(store);
        };

        let seeds: Vec<SeedRecord> = read_json_lines(&path)?;
        debug!(path = %path.display(), records = seeds.len(), "seeding record store");
        for seed in seeds {
            store.insert(&seed.collection, seed.record)?;
        }
        Ok(store)
    }
}

/// Install the stderr log subscriber. Later calls are no-ops.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Validate {
            config,
            collection,
            update,
            actor,
        } => validate(&config, &collection, update, actor.as_deref()),
        Command::CheckSchema { config } => check_schema(&config),
    }
}

/// Validate one record read from stdin.
///
/// A rejected record is reported on stdout with its record error code and
/// also fails the command.
pub fn validate(
    config_path: &Path,
    collection: &str,
    update: bool,
    actor: Option<&str>,
) -> CliResult<()> {
    let config = Config::load(config_path)?;
    init_logging(&config.log_filter);

    let body = read_request()?;
    match validate_record(&config, collection, update, actor, &body)? {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code(), &e.to_string())?;
            Err(e.into())
        }
    }
}

/// Validate `body` against the collection's schema.
///
/// The outer result carries configuration and runtime failures; the inner
/// one is the verdict on the record.
pub fn validate_record(
    config: &Config,
    collection: &str,
    update: bool,
    actor: Option<&str>,
    body: &Value,
) -> CliResult<RecordResult<Value>> {
    let loader = config.load_schemas()?;
    let schema = loader
        .get(collection)
        .ok_or_else(|| CliError::unknown_collection(collection))?;
    let store = config.load_store()?;

    let mut builder = RecordBuilder::from_collection(schema).with_store(Arc::new(store));
    if let (None, Some(casing)) = (schema.format, config.global_format) {
        builder = builder.with_formatting(casing.into());
    }

    let actor = actor.map(Actor::new);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_error(format!("Failed to create tokio runtime: {}", e)))?;

    let verdict = rt.block_on(async {
        if update {
            builder
                .for_update(body, actor.as_ref())
                .await
                .map(|validation| json!(validation))
        } else {
            builder
                .for_save(body, actor.as_ref())
                .await
                .map(|saved| json!(saved))
        }
    });

    Ok(verdict)
}

/// Load every schema document and report collection summaries
pub fn check_schema(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    init_logging(&config.log_filter);

    let summary = schema_summary(&config)?;
    write_response(summary)
}

/// Collection names with their field counts
pub fn schema_summary(config: &Config) -> CliResult<Value> {
    let loader = config.load_schemas()?;

    let collections: Vec<Value> = loader
        .collections()
        .into_iter()
        .filter_map(|name| loader.get(name))
        .map(|collection| {
            let schema = &collection.schema;
            let meta = schema
                .entries()
                .iter()
                .filter(|(key, _)| schema.is_meta(key))
                .count();
            json!({
                "collection": collection.collection,
                "fields": schema.len() - meta,
                "meta": meta,
                "unique": schema.unique_fields().collect::<Vec<_>>(),
            })
        })
        .collect();

    Ok(json!({ "collections": collections }))
}
