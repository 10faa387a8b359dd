//! kodegen_bundler_pkg - turn macOS applications into installer packages.
//!
//! Accepts a `.app` inside a disk image or archive and produces a `.pkg`,
//! either for one architecture, as a universal package or from a vendor
//! installer.

use kodegen_bundler_pkg::cli;
use kodegen_bundler_pkg::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    let args = cli::parse_args();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli::default_log_filter(&args)),
    )
    .init();

    match cli::execute_command(args).await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false, false);
            output.error(&format!("Fatal error: {e}"));
            output.suggestions(&e.recovery_suggestions());
            process::exit(1);
        }
    }
}
