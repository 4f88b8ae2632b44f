//! aerorecord - schema-driven record validation and metadata derivation
//!
//! - `schema`: field descriptors, type functions and the JSON schema loader
//! - `record`: validation pipeline, duplicate checks, metadata labels
//! - `cli`: command line front-end

pub mod cli;
pub mod record;
pub mod schema;
