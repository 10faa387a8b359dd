//! Command execution.

mod build;
mod helpers;
mod inspect;

use crate::cli::{Args, Command, OutputManager};
use crate::error::Result;

use build::{execute_build, execute_universal, execute_vendor};
use inspect::execute_inspect;

/// Execute the command, returning the process exit code.
///
/// Failures are reported here and turned into exit code 1.
pub async fn execute_command(args: Args) -> Result<i32> {
    let output = OutputManager::new(args.verbose, args.quiet, args.json);

    if let Err(reason) = args.validate() {
        output.error(&format!("Invalid arguments: {reason}"));
        return Ok(1);
    }

    let settings = args.settings();
    let result = match &args.command {
        Command::Build {
            input, output_dir, ..
        } => execute_build(&settings, &output, input, output_dir.as_deref()).await,
        Command::Universal {
            arm64,
            x86_64,
            output_dir,
            ..
        } => execute_universal(&settings, &output, arm64, x86_64, output_dir.as_deref()).await,
        Command::Vendor {
            input, output_dir, ..
        } => execute_vendor(&settings, &output, input, output_dir.as_deref()).await,
        Command::Inspect {
            package,
            expect_identifier,
            expect_version,
        } => {
            let expectation = expect_identifier.as_deref().zip(expect_version.as_deref());
            execute_inspect(&settings, &output, package, expectation).await
        }
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            output.error(&format!("Command '{}' failed: {}", args.command.name(), e));
            output.suggestions(&e.recovery_suggestions());
            Ok(1)
        }
    }
}
