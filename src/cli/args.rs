//! CLI argument definitions using clap
//!
//! Commands:
//! - aerorecord validate --config <path> --collection <name> [--update] [--actor <id>]
//! - aerorecord check-schema --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerorecord - schema-driven record validation
#[derive(Parser, Debug)]
#[command(name = "aerorecord")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate one JSON record read from stdin
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = "./aerorecord.json")]
        config: PathBuf,

        /// Collection whose schema applies
        #[arg(long)]
        collection: String,

        /// Validate as an update of an existing record (no new identifier)
        #[arg(long)]
        update: bool,

        /// Identity of the requesting actor
        #[arg(long)]
        actor: Option<String>,
    },

    /// Load every schema document and report what was found
    CheckSchema {
        /// Path to configuration file
        #[arg(long, default_value = "./aerorecord.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
