//! macOS installer package builder.
//!
//! Turns an application delivered as a `.app`, `.dmg`, `.zip` or `.tbz` into
//! a flat installer package (`.pkg`) that installs into `/Applications` on
//! the boot volume.
//!
//! # Package kinds
//!
//! | Entry point | Input | Output |
//! |-------------|-------|--------|
//! | [`Bundler::build`] | one application | `{Name}-{Version}-{arch}.pkg` |
//! | [`Bundler::build_universal`] | arm64 + x86_64 builds | `{Name}-{Version}-universal.pkg` |
//! | [`Bundler::build_vendor`] | vendor driver + `products/driver.xml` | self-installing `.pkg` |
//!
//! Each build runs in its own temporary workspace with its own mount points,
//! so concurrent builds never interfere except when they target the same
//! output file (last writer wins).
//!
//! # Integration
//!
//! ```no_run
//! use kodegen_bundler_pkg::bundler::{ArchitecturePolicy, Bundler, SettingsBuilder};
//!
//! # async fn example() -> kodegen_bundler_pkg::bundler::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .architecture_policy(ArchitecturePolicy::Tolerant)
//!     .build();
//!
//! let bundler = Bundler::new(settings);
//! let package = bundler
//!     .build_universal("arm64/App.zip", "x86_64/App.zip", None)
//!     .await?;
//! assert!(package.path.ends_with("App-9.0-universal.pkg"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod builder;
pub mod error;
pub mod layout;
pub mod log;
pub mod pipeline;
pub mod platform;
pub mod process;
mod settings;
mod utils;
pub mod workspace;

// Public re-exports
pub use builder::{BuiltPackage, Bundler};
pub use error::{Error, Result};
pub use log::RunLog;
pub use pipeline::Stage;
pub use platform::macos::inspect::{PackageContents, PackageRef, SignatureAssessment};
pub use platform::macos::metadata::PackageInfo;
pub use platform::{Arch, InputArtifact};
pub use process::{SystemRunner, ToolCommand, ToolOutput, ToolRunner};
pub use settings::{
    ArchitecturePolicy, DEFAULT_SEARCH_DEPTH, DEFAULT_VENDOR_IDENTIFIER_PREFIX, Settings,
    SettingsBuilder, ToolPaths, VendorSettings,
};
