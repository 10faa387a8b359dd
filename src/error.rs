//! Error types for the command line front end.
//!
//! Wraps pipeline errors with the CLI's own failures and attaches recovery
//! suggestions.

use crate::bundler;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, PackagerError>;

/// Main error type returned by [`crate::cli::run`]
#[derive(Error, Debug)]
pub enum PackagerError {
    /// Pipeline errors
    #[error("{0}")]
    Bundler(#[from] bundler::Error),

    /// CLI argument and preflight errors
    #[error("{0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Command line errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Required tools are not installed
    #[error("Missing required tools: {}", tools.join(", "))]
    MissingTools {
        /// Tool names that could not be found
        tools: Vec<String>,
    },

    /// An inspected package did not match expectations
    #[error("Package verification failed: {reason}")]
    VerificationFailed {
        /// What did not match
        reason: String,
    },
}

impl PackagerError {
    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PackagerError::Cli(CliError::MissingTools { .. }) => vec![
                "Install the Xcode command line tools: xcode-select --install".to_string(),
                "These tools ship with macOS; packages can only be built on a Mac".to_string(),
            ],
            PackagerError::Bundler(err) => match err.root_cause() {
                bundler::Error::UnsupportedInput { .. } => vec![
                    "Pass a .app bundle, .dmg disk image, .zip or .tbz archive".to_string(),
                ],
                bundler::Error::UnknownArchitecture { .. } => vec![
                    "Re-run with --allow-unknown-arch to package it as 'unknown'".to_string(),
                ],
                bundler::Error::ArchitectureMismatch { .. } => vec![
                    "Check that --arm64 and --x86-64 were not swapped".to_string(),
                    "Re-run with --allow-unknown-arch to package anyway".to_string(),
                ],
                bundler::Error::UniversalMismatch { .. } => vec![
                    "Both builds must carry the same CFBundleIdentifier and CFBundleShortVersionString"
                        .to_string(),
                ],
                bundler::Error::MissingPlistKey { key, .. } => vec![format!(
                    "Add {key} to the application's Contents/Info.plist"
                )],
                bundler::Error::UnmappedPlatform(_) => vec![
                    "Only macarm64, osx10 and osx10-64 vendor platforms can be packaged"
                        .to_string(),
                ],
                bundler::Error::BundleNotFound { .. } => vec![
                    "Check the input contains a .app bundle".to_string(),
                    "Raise --search-depth if the bundle is deeply nested".to_string(),
                ],
                bundler::Error::MountPointNotFound { .. } => vec![
                    "List attached images with: hdiutil info".to_string(),
                ],
                _ => vec!["Re-run with --verbose for the full tool output".to_string()],
            },
            _ => vec![],
        }
    }
}
