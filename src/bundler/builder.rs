//! Package build orchestration.
//!
//! [`Bundler`] is the library entry point. It owns the configuration, the
//! tool runner and a base [`RunLog`]; every call starts an independent run
//! with its own workspace and log id.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_pkg::bundler::{Bundler, SettingsBuilder};
//!
//! # async fn example() -> kodegen_bundler_pkg::bundler::Result<()> {
//! let bundler = Bundler::new(SettingsBuilder::new().build());
//!
//! let package = bundler.build("Downloads/MyApp.zip", None).await?;
//! println!("Created: {} ({} bytes)", package.path.display(), package.size);
//! println!("SHA256: {}", package.checksum);
//! # Ok(())
//! # }
//! ```

use crate::bundler::error::{ErrorExt, Result};
use crate::bundler::layout::{PackageLayout, StandardLayout, UniversalLayout, VendorLayout};
use crate::bundler::log::RunLog;
use crate::bundler::pipeline::{self, RunContext};
use crate::bundler::platform::Arch;
use crate::bundler::process::{SystemRunner, ToolRunner};
use crate::bundler::settings::Settings;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A finished installer package.
///
/// # Fields
///
/// - `path`: the `.pkg` file
/// - `components`: identifiers of the component packages inside it
/// - `size` / `checksum`: byte length and SHA-256 of the file
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BuiltPackage {
    /// Path of the produced package.
    pub path: PathBuf,
    /// Application name.
    pub name: String,
    /// Package identifier.
    pub identifier: String,
    /// Package version.
    pub version: String,
    /// Architecture in the file name.
    pub architecture: Arch,
    /// Component identifiers referenced by the distribution.
    pub components: Vec<String>,
    /// Size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the package.
    pub checksum: String,
}

/// Main package builder.
///
/// Generic over the [`ToolRunner`] so tests can script tool behaviour;
/// [`Bundler::new`] uses the real tools.
#[derive(Debug)]
pub struct Bundler<R: ToolRunner = SystemRunner> {
    settings: Settings,
    runner: R,
    log: RunLog,
}

impl Bundler<SystemRunner> {
    /// Creates a bundler that runs the system tools.
    pub fn new(settings: Settings) -> Self {
        Self::with_runner(settings, SystemRunner)
    }
}

impl<R: ToolRunner> Bundler<R> {
    /// Creates a bundler with a custom tool runner.
    pub fn with_runner(settings: Settings, runner: R) -> Self {
        Self {
            settings,
            runner,
            log: RunLog::new(),
        }
    }

    /// Replaces the base log. Runs derive their own id from it and share its
    /// transcript.
    pub fn with_log(mut self, log: RunLog) -> Self {
        self.log = log;
        self
    }

    /// Returns the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the tool runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Builds a package installing one application into `/Applications`.
    ///
    /// `input` may be a `.app`, `.dmg`, `.zip` or `.tbz`. The package is
    /// written to `output_dir`, defaulting to the input's directory.
    pub async fn build(
        &self,
        input: impl AsRef<Path>,
        output_dir: Option<&Path>,
    ) -> Result<BuiltPackage> {
        let input = input.as_ref().to_path_buf();
        self.run(&StandardLayout, vec![input], output_dir).await
    }

    /// Builds one package from separate arm64 and x86_64 builds.
    ///
    /// Installer picks the component matching the host CPU. Both inputs must
    /// carry the same identifier and version.
    pub async fn build_universal(
        &self,
        arm64_input: impl AsRef<Path>,
        x86_64_input: impl AsRef<Path>,
        output_dir: Option<&Path>,
    ) -> Result<BuiltPackage> {
        let inputs = vec![
            arm64_input.as_ref().to_path_buf(),
            x86_64_input.as_ref().to_path_buf(),
        ];
        self.run(&UniversalLayout, inputs, output_dir).await
    }

    /// Builds a self-installing package from a vendor driver distribution.
    pub async fn build_vendor(
        &self,
        input: impl AsRef<Path>,
        output_dir: Option<&Path>,
    ) -> Result<BuiltPackage> {
        let input = input.as_ref().to_path_buf();
        self.run(&VendorLayout, vec![input], output_dir).await
    }

    async fn run<L: PackageLayout>(
        &self,
        layout: &L,
        inputs: Vec<PathBuf>,
        output_dir: Option<&Path>,
    ) -> Result<BuiltPackage> {
        let log = self.log.for_run();
        let output_dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => inputs
                .first()
                .map(|input| pipeline::default_output_dir(input))
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let ctx = RunContext {
            settings: &self.settings,
            runner: &self.runner,
            log: &log,
        };
        let assembly = pipeline::run(layout, ctx, &inputs, &output_dir).await?;

        let size = tokio::fs::metadata(&assembly.path)
            .await
            .fs_context("reading package metadata", &assembly.path)?
            .len();
        let checksum = calculate_sha256(&assembly.path).await?;

        Ok(BuiltPackage {
            path: assembly.path,
            name: assembly.info.name,
            identifier: assembly.info.identifier,
            version: assembly.info.version,
            architecture: assembly.info.architecture,
            components: assembly.components,
            size,
            checksum,
        })
    }
}

/// Hex-encoded SHA-256 of a file, read in 8KB chunks.
async fn calculate_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening package", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading package", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
