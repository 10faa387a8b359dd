//! Component packages via `pkgbuild`.
//!
//! `pkgbuild --analyze` writes a component property list describing every
//! bundle under the root. Installer relocates bundles it finds elsewhere on
//! disk unless `BundleIsRelocatable` is false, which would send the payload
//! to an old copy of the app instead of `/Applications`, so every entry is
//! patched before the real build.

use crate::bundler::error::{Error, Result};
use crate::bundler::log::RunLog;
use crate::bundler::process::{ToolCommand, ToolRunner, run_checked};
use crate::bundler::settings::Settings;
use crate::bundler::utils::fs;
use plist::Value;
use std::path::{Path, PathBuf};

const RELOCATABLE_KEY: &str = "BundleIsRelocatable";

/// Inputs for one component package.
#[derive(Clone, Debug)]
pub struct ComponentSpec<'a> {
    /// Staged package root.
    pub root: &'a Path,
    /// Where the component plist is written.
    pub component_plist: &'a Path,
    /// Package identifier.
    pub identifier: &'a str,
    /// Package version.
    pub version: &'a str,
    /// Install scripts directory, if any.
    pub scripts: Option<&'a Path>,
    /// Output component package path.
    pub output: &'a Path,
}

/// Sets `BundleIsRelocatable` to false on every dictionary in the array.
///
/// Returns the number of entries patched.
pub fn disable_relocation(value: &mut Value) -> Result<usize> {
    let entries = value.as_array_mut().ok_or_else(|| {
        Error::GenericError("component property list is not an array".into())
    })?;

    let mut patched = 0;
    for entry in entries.iter_mut() {
        if let Some(dict) = entry.as_dictionary_mut() {
            dict.insert(RELOCATABLE_KEY.to_string(), Value::Boolean(false));
            patched += 1;
        }
    }
    Ok(patched)
}

/// Rewrites the component plist at `path` with relocation disabled.
pub fn patch_component_plist(path: &Path) -> Result<usize> {
    let mut value = Value::from_file(path)?;
    let patched = disable_relocation(&mut value)?;
    value.to_file_xml(path)?;
    Ok(patched)
}

/// Analyzes, patches and builds one component package.
pub async fn build_component<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    spec: &ComponentSpec<'_>,
    log: &RunLog,
) -> Result<PathBuf> {
    let pkgbuild = &settings.tools().pkgbuild;

    run_checked(
        runner,
        ToolCommand::new(pkgbuild)
            .arg("--analyze")
            .arg("--root")
            .arg(spec.root)
            .arg(spec.component_plist),
        log,
    )
    .await?;

    let patched = patch_component_plist(spec.component_plist)?;
    log.debug(format_args!(
        "Disabled relocation on {} bundle(s) in {}",
        patched,
        spec.component_plist.display()
    ));

    if let Some(parent) = spec.output.parent() {
        fs::create_dir_all(parent, false).await?;
    }

    let mut command = ToolCommand::new(pkgbuild)
        .arg("--root")
        .arg(spec.root)
        .arg("--component-plist")
        .arg(spec.component_plist)
        .arg("--identifier")
        .arg(spec.identifier)
        .arg("--version")
        .arg(spec.version)
        .args(["--install-location", "/"]);
    if let Some(scripts) = spec.scripts {
        command = command.arg("--scripts").arg(scripts);
    }
    command = command.arg(spec.output);

    run_checked(runner, command, log).await?;
    log.info(format_args!(
        "Built component {} ({} {})",
        spec.output.display(),
        spec.identifier,
        spec.version
    ));
    Ok(spec.output.to_path_buf())
}
