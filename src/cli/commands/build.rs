//! `build`, `universal` and `vendor` commands.

use super::helpers::{preflight, resolve_input, resolve_output_dir};
use crate::bundler::{BuiltPackage, Bundler, Settings};
use crate::cli::OutputManager;
use crate::error::Result;
use std::path::Path;

fn bundler(settings: &Settings) -> Result<Bundler> {
    preflight(settings.tools().build_tools())?;
    Ok(Bundler::new(settings.clone()))
}

fn report(output: &OutputManager, package: &BuiltPackage) -> Result<()> {
    output.json(package)?;
    output.package(package);
    Ok(())
}

/// Execute `build`
pub(super) async fn execute_build(
    settings: &Settings,
    output: &OutputManager,
    input: &Path,
    output_dir: Option<&Path>,
) -> Result<()> {
    let input = resolve_input(input)?;
    let output_dir = resolve_output_dir(output_dir)?;
    let bundler = bundler(settings)?;

    output.info(&format!("Packaging {}", input.display()));
    let package = bundler.build(&input, output_dir.as_deref()).await?;
    report(output, &package)
}

/// Execute `universal`
pub(super) async fn execute_universal(
    settings: &Settings,
    output: &OutputManager,
    arm64: &Path,
    x86_64: &Path,
    output_dir: Option<&Path>,
) -> Result<()> {
    let arm64 = resolve_input(arm64)?;
    let x86_64 = resolve_input(x86_64)?;
    let output_dir = resolve_output_dir(output_dir)?;
    let bundler = bundler(settings)?;

    output.info(&format!(
        "Packaging {} (arm64) and {} (x86_64)",
        arm64.display(),
        x86_64.display()
    ));
    let package = bundler
        .build_universal(&arm64, &x86_64, output_dir.as_deref())
        .await?;
    report(output, &package)
}

/// Execute `vendor`
pub(super) async fn execute_vendor(
    settings: &Settings,
    output: &OutputManager,
    input: &Path,
    output_dir: Option<&Path>,
) -> Result<()> {
    let input = resolve_input(input)?;
    let output_dir = resolve_output_dir(output_dir)?;
    let bundler = bundler(settings)?;

    output.info(&format!("Packaging vendor installer {}", input.display()));
    let package = bundler.build_vendor(&input, output_dir.as_deref()).await?;
    report(output, &package)
}
