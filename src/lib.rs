//! # kodegen_bundler_pkg
//!
//! Builds macOS installer packages (`.pkg`) from applications delivered as
//! disk images, zip archives or bzip2 tarballs.
//!
//! ## Features
//!
//! - **Standard packages**: one `.app` installed into `/Applications`
//! - **Universal packages**: an arm64 and an x86_64 build behind one
//!   installer that picks the right half at install time
//! - **Vendor installers**: wraps an installer app whose product manifest
//!   describes it, and runs it silently from a postinstall script
//! - **Licence-gated images**: disk images with an attached agreement are
//!   converted before mounting, so no prompt blocks the run
//! - **Inspection**: checks an existing package's signature and contents
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_pkg build MyApp.dmg
//! kodegen_bundler_pkg universal --arm64 MyApp-arm.zip --x86-64 MyApp-intel.zip
//! kodegen_bundler_pkg vendor Photoshop_Installer.dmg
//! kodegen_bundler_pkg inspect MyApp-2.3.1-arm64.pkg
//! ```
//!
//! ## Library
//!
//! ```no_run
//! use kodegen_bundler_pkg::{Bundler, SettingsBuilder};
//!
//! # async fn demo() -> kodegen_bundler_pkg::bundler::Result<()> {
//! let bundler = Bundler::new(SettingsBuilder::new().build());
//! let package = bundler.build("MyApp.dmg", None).await?;
//! println!("{} ({})", package.path.display(), package.checksum);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod cli;
pub mod error;

pub use bundler::{BuiltPackage, Bundler, Settings, SettingsBuilder};
pub use cli::Args;
pub use error::{CliError, PackagerError, Result};
