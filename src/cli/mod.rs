//! Command line interface for kodegen_bundler_pkg.
//!
//! Parses arguments, runs one pipeline (or the inspector) and reports the
//! result as colored text or JSON.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}

/// Parse arguments without executing
pub fn parse_args() -> Args {
    Args::parse_args()
}

/// Log filter implied by the verbosity flags; `RUST_LOG` overrides it.
pub fn default_log_filter(args: &Args) -> &'static str {
    if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    }
}
