//! The staged package pipeline.
//!
//! Every build, whatever its [`PackageLayout`], walks the same stages:
//!
//! ```text
//! Resolving → MetadataExtracted → RootStaged → ComponentBuilt
//!           → DistributionSynthesized → Assembled
//! ```
//!
//! Inputs are classified before anything touches the disk. The workspace is
//! created next and is cleaned up (volumes detached, directory removed)
//! exactly once, on success and on every failure path.

use crate::bundler::error::{Error, Result};
use crate::bundler::layout::{PackageLayout, StagedRoot};
use crate::bundler::log::RunLog;
use crate::bundler::platform::InputArtifact;
use crate::bundler::platform::macos::archive::{self, ArchiveKind};
use crate::bundler::platform::macos::component::{self, ComponentSpec};
use crate::bundler::platform::macos::metadata::PackageInfo;
use crate::bundler::platform::macos::{assembler, locator, volume};
use crate::bundler::process::ToolRunner;
use crate::bundler::settings::Settings;
use crate::bundler::workspace::BuildWorkspace;
use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline stages, in order. An error tagged with a stage failed while
/// that stage was running.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Stage {
    /// Locating the bundle inside the input.
    Resolving,
    /// Reading identity and architecture.
    MetadataExtracted,
    /// Copying the payload into package roots.
    RootStaged,
    /// Running `pkgbuild`.
    ComponentBuilt,
    /// Producing `distribution.xml`.
    DistributionSynthesized,
    /// Running `productbuild`.
    Assembled,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Resolving => "resolving",
            Stage::MetadataExtracted => "metadata",
            Stage::RootStaged => "root staging",
            Stage::ComponentBuilt => "component build",
            Stage::DistributionSynthesized => "distribution synthesis",
            Stage::Assembled => "assembly",
        })
    }
}

/// Borrowed collaborators for one run.
#[derive(Debug)]
pub struct RunContext<'a, R: ToolRunner> {
    /// Run configuration.
    pub settings: &'a Settings,
    /// Tool runner.
    pub runner: &'a R,
    /// Per-run log.
    pub log: &'a RunLog,
}

impl<R: ToolRunner> Clone for RunContext<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ToolRunner> Copy for RunContext<'_, R> {}

/// A component package produced by the pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuiltComponent {
    /// Root label (`arm64`, `x86_64`) or `None` for single-component builds.
    pub label: Option<String>,
    /// Component identifier passed to `pkgbuild`.
    pub identifier: String,
    /// Path inside the workspace's components directory.
    pub path: PathBuf,
}

impl BuiltComponent {
    /// File name as referenced from the distribution descriptor.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What a successful run produced.
#[derive(Clone, Debug)]
pub struct Assembly {
    /// Final package path.
    pub path: PathBuf,
    /// Application identity.
    pub info: PackageInfo,
    /// Identifiers of the components inside the package.
    pub components: Vec<String>,
}

/// Classifies each input and checks it exists.
pub fn classify_inputs(inputs: &[PathBuf]) -> Result<Vec<InputArtifact>> {
    inputs
        .iter()
        .map(|path| {
            let artifact = InputArtifact::from_path(path)?;
            if !path.exists() {
                return Err(Error::InputNotFound { path: path.clone() });
            }
            Ok(artifact)
        })
        .collect()
}

/// Directory the package is written to when the caller gives none.
pub fn default_output_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Runs `layout` over `inputs` and writes the package into `output_dir`.
pub async fn run<L, R>(
    layout: &L,
    ctx: RunContext<'_, R>,
    inputs: &[PathBuf],
    output_dir: &Path,
) -> Result<Assembly>
where
    L: PackageLayout,
    R: ToolRunner,
{
    let artifacts = classify_inputs(inputs).map_err(|e| e.at_stage(Stage::Resolving))?;
    let mut workspace =
        BuildWorkspace::create(ctx.settings.workspace_root()).map_err(|e| e.at_stage(Stage::Resolving))?;

    ctx.log.info(format_args!(
        "Building {} package in {}",
        layout.name(),
        workspace.path().display()
    ));

    let result = run_stages(layout, ctx, &artifacts, &mut workspace, output_dir).await;
    workspace.cleanup(ctx.settings, ctx.runner, ctx.log).await;

    match &result {
        Ok(assembly) => ctx.log.info(format_args!("Built {}", assembly.path.display())),
        Err(e) => ctx.log.error(format_args!("Build failed: {e}")),
    }
    result
}

async fn run_stages<L, R>(
    layout: &L,
    ctx: RunContext<'_, R>,
    artifacts: &[InputArtifact],
    workspace: &mut BuildWorkspace,
    output_dir: &Path,
) -> Result<Assembly>
where
    L: PackageLayout,
    R: ToolRunner,
{
    enter(ctx.log, Stage::Resolving);
    let mut bundles = Vec::with_capacity(artifacts.len());
    for (index, artifact) in artifacts.iter().enumerate() {
        let bundle = resolve_bundle(ctx, workspace, artifact, index)
            .await
            .map_err(|e| e.at_stage(Stage::Resolving))?;
        ctx.log.info(format_args!("Resolved {} to {}", artifact, bundle.display()));
        bundles.push(bundle);
    }

    enter(ctx.log, Stage::MetadataExtracted);
    let info = layout
        .read_info(ctx, &bundles)
        .await
        .map_err(|e| e.at_stage(Stage::MetadataExtracted))?;

    enter(ctx.log, Stage::RootStaged);
    let roots = layout
        .stage_roots(ctx, workspace, &bundles, &info)
        .await
        .map_err(|e| e.at_stage(Stage::RootStaged))?;

    enter(ctx.log, Stage::ComponentBuilt);
    let mut components = Vec::with_capacity(roots.len());
    for root in &roots {
        let component = build_component(ctx, workspace, &info, root)
            .await
            .map_err(|e| e.at_stage(Stage::ComponentBuilt))?;
        components.push(component);
    }

    enter(ctx.log, Stage::DistributionSynthesized);
    let distribution = workspace.distribution_xml();
    layout
        .write_distribution(ctx, &distribution, &info, &components)
        .await
        .map_err(|e| e.at_stage(Stage::DistributionSynthesized))?;

    enter(ctx.log, Stage::Assembled);
    let output = output_dir.join(assembler::output_file_name(
        &info.name,
        &info.version,
        info.architecture,
    ));
    let path = assembler::assemble(
        ctx.settings,
        ctx.runner,
        &distribution,
        &workspace.components_dir(),
        &output,
        ctx.log,
    )
    .await
    .map_err(|e| e.at_stage(Stage::Assembled))?;

    Ok(Assembly {
        path,
        info,
        components: components.into_iter().map(|c| c.identifier).collect(),
    })
}

fn enter(log: &RunLog, stage: Stage) {
    log.debug(format_args!("stage: {stage}"));
}

/// Finds the bundle an input artifact stands for, mounting and extracting
/// as needed. Mounted volumes are handed to the workspace.
async fn resolve_bundle<R: ToolRunner>(
    ctx: RunContext<'_, R>,
    workspace: &mut BuildWorkspace,
    artifact: &InputArtifact,
    index: usize,
) -> Result<PathBuf> {
    let depth = ctx.settings.search_depth();
    match artifact {
        InputArtifact::AppBundle(path) => {
            if locator::is_bundle_dir(path) {
                Ok(path.clone())
            } else {
                Err(Error::BundleNotFound { root: path.clone() })
            }
        }
        InputArtifact::DiskImage(dmg) => mount_and_locate(ctx, workspace, dmg).await,
        InputArtifact::ZipArchive(zip) => {
            let scratch = workspace.scratch_dir(index).await?;
            archive::extract(ctx.settings, ctx.runner, zip, ArchiveKind::Zip, &scratch, ctx.log)
                .await?;

            if let Some(dmg) = archive::immediate_disk_image(&scratch).await? {
                ctx.log.info(format_args!(
                    "{} wraps disk image {}",
                    zip.display(),
                    dmg.display()
                ));
                return mount_and_locate(ctx, workspace, &dmg).await;
            }
            match archive::immediate_bundle(&scratch).await? {
                Some(bundle) => Ok(bundle),
                None => locator::locate_bundle(&scratch, depth).await,
            }
        }
        InputArtifact::TbzArchive(tbz) => {
            let scratch = workspace.scratch_dir(index).await?;
            archive::extract(ctx.settings, ctx.runner, tbz, ArchiveKind::Tbz, &scratch, ctx.log)
                .await?;
            match archive::immediate_bundle(&scratch).await? {
                Some(bundle) => Ok(bundle),
                None => locator::locate_bundle(&scratch, depth).await,
            }
        }
    }
}

async fn mount_and_locate<R: ToolRunner>(
    ctx: RunContext<'_, R>,
    workspace: &mut BuildWorkspace,
    dmg: &Path,
) -> Result<PathBuf> {
    let mounted = volume::mount(ctx.settings, ctx.runner, dmg, ctx.log).await?;
    let mount_point = workspace.track_mount(mounted).mount_point().to_path_buf();
    locator::locate_bundle(&mount_point, ctx.settings.search_depth()).await
}

async fn build_component<R: ToolRunner>(
    ctx: RunContext<'_, R>,
    workspace: &BuildWorkspace,
    info: &PackageInfo,
    root: &StagedRoot,
) -> Result<BuiltComponent> {
    let label = root.label.as_deref();
    let output = workspace
        .components_dir()
        .join(format!("{}.pkg", root.identifier));
    let component_plist = workspace.component_plist(label);

    let path = component::build_component(
        ctx.settings,
        ctx.runner,
        &ComponentSpec {
            root: &root.path,
            component_plist: &component_plist,
            identifier: &root.identifier,
            version: &info.version,
            scripts: root.scripts.as_deref(),
            output: &output,
        },
        ctx.log,
    )
    .await?;

    Ok(BuiltComponent {
        label: root.label.clone(),
        identifier: root.identifier.clone(),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Resolving.to_string(), "resolving");
        assert_eq!(Stage::Assembled.to_string(), "assembly");
    }

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("/downloads/MyApp.zip")),
            PathBuf::from("/downloads")
        );
        assert_eq!(default_output_dir(Path::new("MyApp.zip")), PathBuf::from("."));
    }

    #[test]
    fn test_classify_inputs_checks_extension_before_existence() {
        let err = classify_inputs(&[PathBuf::from("/nonexistent/notes.txt")]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedInput { .. }));

        let err = classify_inputs(&[PathBuf::from("/nonexistent/MyApp.zip")]).unwrap_err();
        assert!(matches!(err, Error::InputNotFound { .. }));
    }
}
