//! aerorecord CLI entry point
//!
//! Parses arguments and dispatches via `cli::run`. Errors go to stderr
//! and exit non-zero; logging is installed by the commands once their
//! config is loaded.

use aerorecord::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
