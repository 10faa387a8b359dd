//! Configuration for package pipeline runs.
//!
//! [`Settings`] is immutable once built; construct it with
//! [`SettingsBuilder`]. Every field has a default suitable for a stock macOS
//! host, so `SettingsBuilder::new().build()` is a valid configuration.
//!
//! # Examples
//!
//! ```no_run
//! use kodegen_bundler_pkg::bundler::{ArchitecturePolicy, SettingsBuilder};
//!
//! let settings = SettingsBuilder::new()
//!     .architecture_policy(ArchitecturePolicy::Tolerant)
//!     .workspace_root("/tmp/pkg-work")
//!     .build();
//! assert_eq!(settings.search_depth(), 20);
//! ```

use std::path::{Path, PathBuf};

/// Default depth for the recursive bundle search.
pub const DEFAULT_SEARCH_DEPTH: usize = 20;

/// Default vendor component identifier prefix.
pub const DEFAULT_VENDOR_IDENTIFIER_PREFIX: &str = "com.adobe.";

/// What to do when the main executable matches neither architecture.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ArchitecturePolicy {
    /// Undeterminable architecture fails the run.
    #[default]
    Strict,
    /// Undeterminable architecture is recorded as `unknown` and the run proceeds.
    Tolerant,
}

/// Program names (or absolute paths) for every external tool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolPaths {
    /// Disk image attach/detach/convert/imageinfo.
    pub hdiutil: PathBuf,
    /// Zip expansion.
    pub ditto: PathBuf,
    /// tar + bzip2 expansion.
    pub tar: PathBuf,
    /// File type identification.
    pub file: PathBuf,
    /// Component package analyze/build.
    pub pkgbuild: PathBuf,
    /// Distribution synthesize/build.
    pub productbuild: PathBuf,
    /// Gatekeeper policy assessment.
    pub spctl: PathBuf,
    /// Package expansion for inspection.
    pub pkgutil: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            hdiutil: "hdiutil".into(),
            ditto: "ditto".into(),
            tar: "tar".into(),
            file: "file".into(),
            pkgbuild: "pkgbuild".into(),
            productbuild: "productbuild".into(),
            spctl: "spctl".into(),
            pkgutil: "pkgutil".into(),
        }
    }
}

impl ToolPaths {
    /// Tools a package build needs, for preflight checks.
    pub fn build_tools(&self) -> [&Path; 6] {
        [
            self.hdiutil.as_path(),
            self.ditto.as_path(),
            self.tar.as_path(),
            self.file.as_path(),
            self.pkgbuild.as_path(),
            self.productbuild.as_path(),
        ]
    }

    /// Tools the inspector needs.
    pub fn inspect_tools(&self) -> [&Path; 2] {
        [self.spctl.as_path(), self.pkgutil.as_path()]
    }
}

/// Vendor-installer variant configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VendorSettings {
    /// Where the vendor driver is staged on the target system.
    ///
    /// `None` derives `/tmp/{name}-installer` from the manifest name.
    pub install_target: Option<PathBuf>,
    /// Prefix for the component identifier derived from the product name.
    pub identifier_prefix: String,
}

impl Default for VendorSettings {
    fn default() -> Self {
        Self {
            install_target: None,
            identifier_prefix: DEFAULT_VENDOR_IDENTIFIER_PREFIX.to_string(),
        }
    }
}

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    tools: ToolPaths,
    architecture_policy: ArchitecturePolicy,
    workspace_root: PathBuf,
    mount_root: PathBuf,
    search_depth: usize,
    vendor: VendorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        SettingsBuilder::new().build()
    }
}

impl Settings {
    /// External tool locations.
    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Unknown-architecture handling.
    pub fn architecture_policy(&self) -> ArchitecturePolicy {
        self.architecture_policy
    }

    /// Directory under which per-run workspaces are created.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Directory passed to `hdiutil attach -mountrandom`.
    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Maximum depth of the recursive bundle search.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    /// Vendor-installer configuration.
    pub fn vendor(&self) -> &VendorSettings {
        &self.vendor
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    tools: ToolPaths,
    architecture_policy: ArchitecturePolicy,
    workspace_root: Option<PathBuf>,
    mount_root: Option<PathBuf>,
    search_depth: Option<usize>,
    vendor: VendorSettings,
}

impl SettingsBuilder {
    /// Creates a builder with stock defaults.
    pub fn new() -> Self {
        Default::default()
    }

    /// Overrides every tool location.
    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the unknown-architecture policy.
    ///
    /// Default: [`ArchitecturePolicy::Strict`]
    pub fn architecture_policy(mut self, policy: ArchitecturePolicy) -> Self {
        self.architecture_policy = policy;
        self
    }

    /// Sets where per-run workspaces are created.
    ///
    /// Default: the system temp directory
    pub fn workspace_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.workspace_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the parent directory for random mount points.
    ///
    /// Default: the system temp directory
    pub fn mount_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.mount_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the recursive bundle search depth.
    ///
    /// Default: [`DEFAULT_SEARCH_DEPTH`]
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.search_depth = Some(depth);
        self
    }

    /// Sets the vendor install target.
    pub fn vendor_install_target<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.vendor.install_target = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the vendor identifier prefix.
    pub fn vendor_identifier_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.vendor.identifier_prefix = prefix.into();
        self
    }

    /// Builds the settings.
    pub fn build(self) -> Settings {
        let temp = std::env::temp_dir();
        Settings {
            tools: self.tools,
            architecture_policy: self.architecture_policy,
            workspace_root: self.workspace_root.unwrap_or_else(|| temp.clone()),
            mount_root: self.mount_root.unwrap_or(temp),
            search_depth: self.search_depth.unwrap_or(DEFAULT_SEARCH_DEPTH),
            vendor: self.vendor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SettingsBuilder::new().build();
        assert_eq!(settings.architecture_policy(), ArchitecturePolicy::Strict);
        assert_eq!(settings.search_depth(), DEFAULT_SEARCH_DEPTH);
        assert_eq!(settings.workspace_root(), std::env::temp_dir());
        assert_eq!(settings.tools().hdiutil, PathBuf::from("hdiutil"));
        assert_eq!(settings.vendor().identifier_prefix, "com.adobe.");
    }

    #[test]
    fn test_overrides() {
        let settings = SettingsBuilder::new()
            .architecture_policy(ArchitecturePolicy::Tolerant)
            .workspace_root("/var/tmp/work")
            .mount_root("/var/tmp/mnt")
            .search_depth(4)
            .vendor_install_target("/private/tmp/Installer")
            .build();
        assert_eq!(settings.architecture_policy(), ArchitecturePolicy::Tolerant);
        assert_eq!(settings.workspace_root(), Path::new("/var/tmp/work"));
        assert_eq!(settings.mount_root(), Path::new("/var/tmp/mnt"));
        assert_eq!(settings.search_depth(), 4);
        assert_eq!(
            settings.vendor().install_target.as_deref(),
            Some(Path::new("/private/tmp/Installer"))
        );
    }
}
