//! `inspect` command.

use super::helpers::preflight;
use crate::bundler::platform::macos::inspect;
use crate::bundler::{RunLog, Settings, SystemRunner};
use crate::cli::OutputManager;
use crate::error::{CliError, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct InspectReport<'a> {
    package: &'a Path,
    assessment: &'a inspect::SignatureAssessment,
    contents: &'a inspect::PackageContents,
}

/// Execute `inspect`
pub(super) async fn execute_inspect(
    settings: &Settings,
    output: &OutputManager,
    package: &Path,
    expectation: Option<(&str, &str)>,
) -> Result<()> {
    if !package.is_file() {
        return Err(CliError::InvalidArguments {
            reason: format!("{} is not a file", package.display()),
        }
        .into());
    }
    preflight(settings.tools().inspect_tools())?;

    let log = RunLog::new();
    let assessment = inspect::assess_signature(settings, &SystemRunner, package, &log).await?;
    let contents = inspect::read_contents(settings, &SystemRunner, package, &log).await?;

    output.json(&InspectReport {
        package,
        assessment: &assessment,
        contents: &contents,
    })?;
    output.inspection(&assessment, &contents);

    if let Some((identifier, version)) = expectation {
        if !contents.matches(identifier, version) {
            return Err(CliError::VerificationFailed {
                reason: format!(
                    "{} does not reference {} {}",
                    package.display(),
                    identifier,
                    version
                ),
            }
            .into());
        }
        output.success(&format!("References {identifier} {version}"));
    }
    Ok(())
}
