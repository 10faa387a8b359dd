//! macOS installer tool drivers.
//!
//! Each module wraps one step of turning an application into an installer
//! package, driving the stock command line tools through a
//! [`ToolRunner`](crate::bundler::process::ToolRunner):
//!
//! | Module | Tools | Purpose |
//! |--------|-------|---------|
//! | [`volume`] | `hdiutil` | licence conversion, attach, detach |
//! | [`archive`] | `ditto`, `tar` | zip / tbz expansion |
//! | [`locator`] | | recursive bundle search |
//! | [`metadata`] | `file` | `Info.plist` identity, executable architecture |
//! | [`vendor`] | | vendor manifest, postinstall script |
//! | [`root`] | | package root staging |
//! | [`component`] | `pkgbuild` | component packages |
//! | [`distribution`] | `productbuild --synthesize` | distribution descriptors |
//! | [`assembler`] | `productbuild --distribution` | final product archive |
//! | [`inspect`] | `spctl`, `pkgutil` | post-build checks |
//!
//! All tools ship with macOS (or the Xcode command line tools); nothing is
//! downloaded.

pub mod archive;
pub mod assembler;
pub mod component;
pub mod distribution;
pub mod inspect;
pub mod locator;
pub mod metadata;
pub mod root;
pub mod vendor;
pub mod volume;
