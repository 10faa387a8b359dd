//! Final product archive via `productbuild --distribution`.

use crate::bundler::error::Result;
use crate::bundler::log::RunLog;
use crate::bundler::platform::Arch;
use crate::bundler::process::{ToolCommand, ToolRunner, run_checked};
use crate::bundler::settings::Settings;
use crate::bundler::utils::fs;
use std::path::{Path, PathBuf};

/// `{name}-{version}-{arch}.pkg`
pub fn output_file_name(name: &str, version: &str, arch: Arch) -> String {
    format!("{name}-{version}-{arch}.pkg")
}

/// Builds the distribution package at `output`.
///
/// Any existing file at `output` is replaced. On failure no partial package
/// is left behind.
pub async fn assemble<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    distribution: &Path,
    package_path: &Path,
    output: &Path,
    log: &RunLog,
) -> Result<PathBuf> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent, false).await?;
    }
    if fs::remove_file_if_exists(output).await? {
        log.info(format_args!("Replacing existing {}", output.display()));
    }

    let result = run_checked(
        runner,
        ToolCommand::new(&settings.tools().productbuild)
            .arg("--distribution")
            .arg(distribution)
            .arg("--package-path")
            .arg(package_path)
            .arg(output),
        log,
    )
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file_if_exists(output).await {
            log.warn(format_args!(
                "Could not remove partial package {}: {}",
                output.display(),
                cleanup
            ));
        }
        return Err(e);
    }

    log.info(format_args!("Assembled {}", output.display()));
    Ok(output.to_path_buf())
}
