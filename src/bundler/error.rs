//! Error types for package pipeline operations.
//!
//! Provides stage tagging, filesystem-specific errors with the offending
//! path attached, and variants for each failure class of a run:
//! input errors, external tool errors and filesystem errors.
//!
//! # Example
//!
//! ```no_run
//! # use std::path::{Path, PathBuf};
//! # type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
//! #
//! # trait ErrorExt<T> {
//! #     fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
//! # }
//! # impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
//! #     fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
//! #         self.map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
//! #     }
//! # }
//! fn stage_dir(path: &Path) -> Result<()> {
//!     std::fs::create_dir_all(path).fs_context("creating staging directory", path)?;
//!     Ok(())
//! }
//! ```

use std::{
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

use crate::bundler::pipeline::Stage;

/// Errors returned by the package pipeline.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// A pipeline stage failed. The run transitions to `Failed`.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage that was running when the error occurred
        stage: Stage,
        /// Underlying error
        source: Box<Self>,
    },

    /// File system error with path context.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "copying bundle")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// The external tool could not be spawned at all.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command line that failed to start
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// The external tool ran and exited non-zero.
    #[error("{command} exited with {}: {}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()), output.trim())]
    ToolFailed {
        /// Command line that was executed
        command: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Merged stdout/stderr of the tool
        output: String,
    },

    /// Input path has an extension the pipeline does not handle.
    #[error("unsupported input {}: expected .app, .dmg, .zip or .tbz", path.display())]
    UnsupportedInput {
        /// Offending input path
        path: PathBuf,
    },

    /// Input path does not exist.
    #[error("input not found: {}", path.display())]
    InputNotFound {
        /// Missing input path
        path: PathBuf,
    },

    /// No `.app` / `.framework` bundle could be found.
    #[error("no application bundle found in {}", root.display())]
    BundleNotFound {
        /// Directory that was searched
        root: PathBuf,
    },

    /// A required property list key is missing or empty.
    #[error("{key} missing from {}", plist.display())]
    MissingPlistKey {
        /// Missing key
        key: &'static str,
        /// Property list that was read
        plist: PathBuf,
    },

    /// The `file` tool output named neither arm64 nor x86_64.
    #[error("could not determine CPU architecture of {}", executable.display())]
    UnknownArchitecture {
        /// Executable that was classified
        executable: PathBuf,
    },

    /// Universal input resolved to an executable of the wrong architecture.
    #[error("{} is {found}, expected {expected}", path.display())]
    ArchitectureMismatch {
        /// Architecture the input was supplied as
        expected: String,
        /// Architecture that was detected
        found: String,
        /// Bundle that was inspected
        path: PathBuf,
    },

    /// The two halves of a universal build disagree on identity.
    #[error("universal inputs disagree on {field}: '{arm64}' vs '{x86_64}'")]
    UniversalMismatch {
        /// Field that differs (identifier / version)
        field: &'static str,
        /// Value read from the arm64 input
        arm64: String,
        /// Value read from the x86_64 input
        x86_64: String,
    },

    /// Vendor manifest platform code has no architecture mapping.
    #[error("unmapped vendor platform code '{0}'")]
    UnmappedPlatform(String),

    /// `hdiutil attach` output did not name a mount point.
    #[error("no mount point reported when attaching {}", dmg.display())]
    MountPointNotFound {
        /// Disk image that was attached
        dmg: PathBuf,
    },

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// Handlebars template rendering error.
    #[error("{0}")]
    HandleBarsError(#[from] handlebars::RenderError),

    /// Regular expression error.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// Property list parsing/writing error.
    #[error("{0}")]
    Plist(#[from] plist::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Wraps this error with the stage it occurred in.
    ///
    /// Already-tagged errors are returned unchanged so the innermost stage wins.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error was raised in, if it was raised inside a run.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Strips the `Stage` wrapper.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying bundle".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::error::Error::GenericError(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::error::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::error::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
