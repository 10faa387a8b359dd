//! Package layouts: what varies between package kinds.
//!
//! The pipeline is the same for every package; a [`PackageLayout`] supplies
//! the three steps that differ:
//!
//! | Layout | Identity | Roots | Descriptor |
//! |--------|----------|-------|------------|
//! | [`StandardLayout`] | `Info.plist` + `file` | `root/Applications/<app>` | synthesized + patched |
//! | [`VendorLayout`] | `products/driver.xml` | `root/<target>/*` + postinstall | synthesized + patched |
//! | [`UniversalLayout`] | both `Info.plist`s, must agree | `root-arm64`, `root-x86_64` | rendered, `is_arm()` gated |

use crate::bail;
use crate::bundler::error::{Error, Result};
use crate::bundler::pipeline::{BuiltComponent, RunContext};
use crate::bundler::platform::Arch;
use crate::bundler::platform::macos::distribution::{self, UniversalDescriptor};
use crate::bundler::platform::macos::metadata::{self, PackageInfo};
use crate::bundler::platform::macos::{root, vendor};
use crate::bundler::process::ToolRunner;
use crate::bundler::settings::ArchitecturePolicy;
use crate::bundler::workspace::BuildWorkspace;
use std::future::Future;
use std::path::{Path, PathBuf};

/// One package root ready for `pkgbuild`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagedRoot {
    /// Architecture label for multi-root layouts.
    pub label: Option<String>,
    /// Root directory.
    pub path: PathBuf,
    /// Component identifier.
    pub identifier: String,
    /// Install scripts directory, if the component carries scripts.
    pub scripts: Option<PathBuf>,
}

/// The variable steps of a package build.
pub trait PackageLayout: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Reads the package identity from the resolved bundles (one per input).
    fn read_info<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        bundles: &[PathBuf],
    ) -> impl Future<Output = Result<PackageInfo>> + Send;

    /// Populates one or more package roots inside the workspace.
    fn stage_roots<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        workspace: &BuildWorkspace,
        bundles: &[PathBuf],
        info: &PackageInfo,
    ) -> impl Future<Output = Result<Vec<StagedRoot>>> + Send;

    /// Writes the distribution descriptor for the built components.
    fn write_distribution<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        output: &Path,
        info: &PackageInfo,
        components: &[BuiltComponent],
    ) -> impl Future<Output = Result<()>> + Send;
}

fn single_bundle(bundles: &[PathBuf]) -> Result<&Path> {
    match bundles {
        [bundle] => Ok(bundle),
        _ => bail!("expected one input bundle, got {}", bundles.len()),
    }
}

fn single_component(components: &[BuiltComponent]) -> Result<&BuiltComponent> {
    match components {
        [component] => Ok(component),
        _ => bail!("expected one component package, got {}", components.len()),
    }
}

/// Synthesize + patch, shared by the single-component layouts.
async fn synthesize_single<R: ToolRunner>(
    ctx: RunContext<'_, R>,
    output: &Path,
    info: &PackageInfo,
    components: &[BuiltComponent],
) -> Result<()> {
    let component = single_component(components)?;
    distribution::synthesize(
        ctx.settings,
        ctx.runner,
        &component.path,
        output,
        &info.name,
        &info.version,
        ctx.log,
    )
    .await
}

/// One application installed into `/Applications`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardLayout;

impl PackageLayout for StandardLayout {
    fn name(&self) -> &'static str {
        "standard"
    }

    async fn read_info<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        bundles: &[PathBuf],
    ) -> Result<PackageInfo> {
        let bundle = single_bundle(bundles)?;
        metadata::read_package_info(ctx.settings, ctx.runner, bundle, ctx.log).await
    }

    async fn stage_roots<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        workspace: &BuildWorkspace,
        bundles: &[PathBuf],
        info: &PackageInfo,
    ) -> Result<Vec<StagedRoot>> {
        let bundle = single_bundle(bundles)?;
        let path = workspace.root_dir(None);
        root::stage_application(bundle, &path, ctx.log).await?;
        Ok(vec![StagedRoot {
            label: None,
            path,
            identifier: info.identifier.clone(),
            scripts: None,
        }])
    }

    async fn write_distribution<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        output: &Path,
        info: &PackageInfo,
        components: &[BuiltComponent],
    ) -> Result<()> {
        synthesize_single(ctx, output, info, components).await
    }
}

/// A vendor driver staged in a temporary directory and run by postinstall.
#[derive(Clone, Copy, Debug, Default)]
pub struct VendorLayout;

impl PackageLayout for VendorLayout {
    fn name(&self) -> &'static str {
        "vendor"
    }

    async fn read_info<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        bundles: &[PathBuf],
    ) -> Result<PackageInfo> {
        let bundle = single_bundle(bundles)?;
        let info = vendor::read_vendor_info(ctx.settings.vendor(), bundle).await?;
        ctx.log.info(format_args!(
            "Vendor product {} {} ({}) for {}",
            info.name, info.version, info.identifier, info.architecture
        ));
        Ok(info)
    }

    async fn stage_roots<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        workspace: &BuildWorkspace,
        bundles: &[PathBuf],
        info: &PackageInfo,
    ) -> Result<Vec<StagedRoot>> {
        let bundle = single_bundle(bundles)?;
        let target = vendor::install_target(ctx.settings.vendor(), &info.name);
        let path = workspace.root_dir(None);
        root::stage_vendor(bundle, &path, &target, ctx.log).await?;

        let scripts = workspace.scripts_dir();
        vendor::write_postinstall(&scripts, &info.name, &target, bundle).await?;
        ctx.log.debug(format_args!(
            "Wrote postinstall for install target {}",
            target.display()
        ));

        Ok(vec![StagedRoot {
            label: None,
            path,
            identifier: info.identifier.clone(),
            scripts: Some(scripts),
        }])
    }

    async fn write_distribution<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        output: &Path,
        info: &PackageInfo,
        components: &[BuiltComponent],
    ) -> Result<()> {
        synthesize_single(ctx, output, info, components).await
    }
}

/// Separate arm64 and x86_64 builds of one application, installed
/// according to the host CPU.
///
/// Inputs are ordered arm64 first.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniversalLayout;

/// Input order of [`UniversalLayout`].
pub const UNIVERSAL_ARCHS: [Arch; 2] = [Arch::Arm64, Arch::X86_64];

/// Checks a universal half was built for `expected`.
///
/// Fat binaries satisfy either half. Under the tolerant policy a mismatch
/// (including an unknown architecture) is only logged.
fn check_half<R: ToolRunner>(
    ctx: RunContext<'_, R>,
    expected: Arch,
    found: Arch,
    bundle: &Path,
) -> Result<()> {
    if found == expected || found == Arch::Universal {
        return Ok(());
    }
    match ctx.settings.architecture_policy() {
        ArchitecturePolicy::Strict => Err(Error::ArchitectureMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
            path: bundle.to_path_buf(),
        }),
        ArchitecturePolicy::Tolerant => {
            ctx.log.warn(format_args!(
                "{} is {}, expected {}; continuing",
                bundle.display(),
                found,
                expected
            ));
            Ok(())
        }
    }
}

impl PackageLayout for UniversalLayout {
    fn name(&self) -> &'static str {
        "universal"
    }

    async fn read_info<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        bundles: &[PathBuf],
    ) -> Result<PackageInfo> {
        let [arm_bundle, intel_bundle] = bundles else {
            bail!(
                "universal packages need two input bundles, got {}",
                bundles.len()
            );
        };

        let arm = metadata::read_package_info(ctx.settings, ctx.runner, arm_bundle, ctx.log).await?;
        let intel =
            metadata::read_package_info(ctx.settings, ctx.runner, intel_bundle, ctx.log).await?;

        if arm.identifier != intel.identifier {
            return Err(Error::UniversalMismatch {
                field: "identifier",
                arm64: arm.identifier,
                x86_64: intel.identifier,
            });
        }
        if arm.version != intel.version {
            return Err(Error::UniversalMismatch {
                field: "version",
                arm64: arm.version,
                x86_64: intel.version,
            });
        }

        check_half(ctx, Arch::Arm64, arm.architecture, arm_bundle)?;
        check_half(ctx, Arch::X86_64, intel.architecture, intel_bundle)?;

        Ok(PackageInfo {
            architecture: Arch::Universal,
            ..arm
        })
    }

    async fn stage_roots<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        workspace: &BuildWorkspace,
        bundles: &[PathBuf],
        info: &PackageInfo,
    ) -> Result<Vec<StagedRoot>> {
        let mut roots = Vec::with_capacity(UNIVERSAL_ARCHS.len());
        for (arch, bundle) in UNIVERSAL_ARCHS.iter().zip(bundles) {
            let label = arch.as_str();
            let path = workspace.root_dir(Some(label));
            root::stage_application(bundle, &path, ctx.log).await?;
            roots.push(StagedRoot {
                label: Some(label.to_string()),
                path,
                identifier: format!("{}.{}", info.identifier, label),
                scripts: None,
            });
        }
        Ok(roots)
    }

    async fn write_distribution<R: ToolRunner>(
        &self,
        ctx: RunContext<'_, R>,
        output: &Path,
        info: &PackageInfo,
        components: &[BuiltComponent],
    ) -> Result<()> {
        let component_for = |arch: Arch| {
            components
                .iter()
                .find(|c| c.label.as_deref() == Some(arch.as_str()))
                .map(BuiltComponent::file_name)
                .ok_or_else(|| {
                    Error::GenericError(format!("no {arch} component package was built"))
                })
        };
        let arm64_package = component_for(Arch::Arm64)?;
        let x86_64_package = component_for(Arch::X86_64)?;

        distribution::write_universal(
            output,
            &UniversalDescriptor {
                name: &info.name,
                identifier: &info.identifier,
                version: &info.version,
                arm64_package: &arm64_package,
                x86_64_package: &x86_64_package,
            },
            ctx.log,
        )
        .await
    }
}
