//! Command line argument parsing and validation.

use crate::bundler::{
    ArchitecturePolicy, DEFAULT_SEARCH_DEPTH, DEFAULT_VENDOR_IDENTIFIER_PREFIX, Settings,
    SettingsBuilder,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build macOS installer packages from applications
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_pkg",
    version,
    about = "Build macOS installer packages from applications",
    long_about = "Turn an application delivered as a .app bundle, .dmg disk image,
.zip or .tbz archive into a flat installer package (.pkg) that installs
into /Applications on the boot volume.

Usage:
  kodegen_bundler_pkg build ~/Downloads/MyApp.zip
  kodegen_bundler_pkg universal --arm64 App-arm64.zip --x86-64 App-x86_64.zip -o dist
  kodegen_bundler_pkg vendor /Volumes/Photoshop/Install.app
  kodegen_bundler_pkg inspect dist/App-9.0-universal.pkg"
)]
pub struct Args {
    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Show debug output, including every tool invocation
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory for per-run build workspaces
    #[arg(long, global = true, value_name = "DIR", env = "KODEGEN_PKG_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Directory under which disk images are mounted
    #[arg(long, global = true, value_name = "DIR", env = "KODEGEN_PKG_MOUNT_ROOT")]
    pub mount_root: Option<PathBuf>,

    /// Maximum depth of the bundle search inside images and archives
    #[arg(
        long,
        global = true,
        value_name = "N",
        env = "KODEGEN_PKG_SEARCH_DEPTH",
        default_value_t = DEFAULT_SEARCH_DEPTH
    )]
    pub search_depth: usize,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Package one application for /Applications
    Build {
        /// .app, .dmg, .zip or .tbz
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output directory (default: the input's directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Package executables of undeterminable architecture as 'unknown'
        #[arg(long)]
        allow_unknown_arch: bool,
    },

    /// Combine arm64 and x86_64 builds into one package
    Universal {
        /// Apple Silicon build
        #[arg(long, value_name = "INPUT")]
        arm64: PathBuf,

        /// Intel build
        #[arg(long = "x86-64", value_name = "INPUT")]
        x86_64: PathBuf,

        /// Output directory (default: the arm64 input's directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Tolerate unknown or mismatched architectures
        #[arg(long)]
        allow_unknown_arch: bool,
    },

    /// Wrap a vendor installer driver in a self-installing package
    Vendor {
        /// Driver bundle, or an image/archive containing it
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output directory (default: the input's directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Where the driver is staged on the target machine
        #[arg(long, value_name = "PATH", env = "KODEGEN_PKG_VENDOR_INSTALL_TARGET")]
        install_target: Option<PathBuf>,

        /// Prefix for the identifier derived from the product name
        #[arg(long, value_name = "PREFIX", default_value = DEFAULT_VENDOR_IDENTIFIER_PREFIX)]
        identifier_prefix: String,
    },

    /// Assess a built package and list its components
    Inspect {
        /// Package to inspect
        #[arg(value_name = "PKG")]
        package: PathBuf,

        /// Fail unless the package references this identifier...
        #[arg(long, value_name = "ID", requires = "expect_version")]
        expect_identifier: Option<String>,

        /// ...at this version
        #[arg(long, value_name = "VERSION", requires = "expect_identifier")]
        expect_version: Option<String>,
    },
}

impl Command {
    /// Subcommand name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Build { .. } => "build",
            Command::Universal { .. } => "universal",
            Command::Vendor { .. } => "vendor",
            Command::Inspect { .. } => "inspect",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.search_depth == 0 {
            return Err("--search-depth must be at least 1".to_string());
        }
        if let Command::Vendor {
            install_target: Some(target),
            ..
        } = &self.command
            && !target.is_absolute()
        {
            return Err(format!(
                "--install-target must be an absolute path, got {}",
                target.display()
            ));
        }
        Ok(())
    }

    /// Pipeline settings for this invocation
    pub fn settings(&self) -> Settings {
        let mut builder = SettingsBuilder::new().search_depth(self.search_depth);
        if let Some(root) = &self.workspace_root {
            builder = builder.workspace_root(root);
        }
        if let Some(root) = &self.mount_root {
            builder = builder.mount_root(root);
        }

        match &self.command {
            Command::Build {
                allow_unknown_arch: true,
                ..
            }
            | Command::Universal {
                allow_unknown_arch: true,
                ..
            } => {
                builder = builder.architecture_policy(ArchitecturePolicy::Tolerant);
            }
            Command::Vendor {
                install_target,
                identifier_prefix,
                ..
            } => {
                builder = builder.vendor_identifier_prefix(identifier_prefix.clone());
                if let Some(target) = install_target {
                    builder = builder.vendor_install_target(target);
                }
            }
            _ => {}
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_build_args_map_to_settings() {
        let args = Args::try_parse_from([
            "kodegen_bundler_pkg",
            "--workspace-root",
            "/var/tmp/work",
            "build",
            "MyApp.zip",
            "--allow-unknown-arch",
        ])
        .expect("parse");

        let settings = args.settings();
        assert_eq!(settings.architecture_policy(), ArchitecturePolicy::Tolerant);
        assert_eq!(settings.workspace_root(), Path::new("/var/tmp/work"));
        assert_eq!(settings.search_depth(), DEFAULT_SEARCH_DEPTH);
        assert_eq!(args.command.name(), "build");
    }

    #[test]
    fn test_universal_requires_both_inputs() {
        assert!(
            Args::try_parse_from(["kodegen_bundler_pkg", "universal", "--arm64", "a.zip"]).is_err()
        );
        let args = Args::try_parse_from([
            "kodegen_bundler_pkg",
            "universal",
            "--arm64",
            "a.zip",
            "--x86-64",
            "b.zip",
        ])
        .expect("parse");
        assert_eq!(args.settings().architecture_policy(), ArchitecturePolicy::Strict);
    }

    #[test]
    fn test_vendor_settings() {
        let args = Args::try_parse_from([
            "kodegen_bundler_pkg",
            "vendor",
            "Install.app",
            "--install-target",
            "/private/tmp/stage",
            "--identifier-prefix",
            "com.example.",
        ])
        .expect("parse");
        assert!(args.validate().is_ok());

        let settings = args.settings();
        assert_eq!(settings.vendor().identifier_prefix, "com.example.");
        assert_eq!(
            settings.vendor().install_target.as_deref(),
            Some(Path::new("/private/tmp/stage"))
        );
    }

    #[test]
    fn test_relative_install_target_rejected() {
        let args = Args::try_parse_from([
            "kodegen_bundler_pkg",
            "vendor",
            "Install.app",
            "--install-target",
            "stage",
        ])
        .expect("parse");
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_expectations_come_in_pairs() {
        assert!(
            Args::try_parse_from([
                "kodegen_bundler_pkg",
                "inspect",
                "x.pkg",
                "--expect-identifier",
                "com.example.app",
            ])
            .is_err()
        );
    }
}
