//! Input classification and CPU architecture types.
//!
//! The pipeline accepts four kinds of input and decides between them purely
//! from the file extension:
//!
//! | Extension | Variant | Resolution |
//! |-----------|---------|------------|
//! | `.app` | [`InputArtifact::AppBundle`] | used as-is |
//! | `.dmg` | [`InputArtifact::DiskImage`] | mounted, bundle located inside |
//! | `.zip` | [`InputArtifact::ZipArchive`] | extracted (embedded `.dmg` first) |
//! | `.tbz` | [`InputArtifact::TbzArchive`] | extracted |
//!
//! The macOS tool drivers live in [`macos`].

pub mod macos;

use crate::bundler::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// The artifact a run starts from. Exactly one variant is active per input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputArtifact {
    /// An application bundle directory.
    AppBundle(PathBuf),
    /// A disk image containing a bundle.
    DiskImage(PathBuf),
    /// A zip archive containing a bundle or a disk image.
    ZipArchive(PathBuf),
    /// A bzip2-compressed tarball containing a bundle.
    TbzArchive(PathBuf),
}

impl InputArtifact {
    /// Classifies `path` by extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedInput`] for any extension other than
    /// `app`, `dmg`, `zip` or `tbz`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let owned = path.to_path_buf();
        match ext.as_deref() {
            Some("app") => Ok(InputArtifact::AppBundle(owned)),
            Some("dmg") => Ok(InputArtifact::DiskImage(owned)),
            Some("zip") => Ok(InputArtifact::ZipArchive(owned)),
            Some("tbz") => Ok(InputArtifact::TbzArchive(owned)),
            _ => Err(Error::UnsupportedInput { path: owned }),
        }
    }

    /// Path of the artifact on disk.
    pub fn path(&self) -> &Path {
        match self {
            InputArtifact::AppBundle(p)
            | InputArtifact::DiskImage(p)
            | InputArtifact::ZipArchive(p)
            | InputArtifact::TbzArchive(p) => p,
        }
    }

    /// Short lowercase name used in log output.
    pub fn short_name(&self) -> &'static str {
        match self {
            InputArtifact::AppBundle(_) => "app",
            InputArtifact::DiskImage(_) => "dmg",
            InputArtifact::ZipArchive(_) => "zip",
            InputArtifact::TbzArchive(_) => "tbz",
        }
    }
}

impl fmt::Display for InputArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.short_name(), self.path().display())
    }
}

/// CPU architecture of an application's main executable.
///
/// The string form is used verbatim in output file names, e.g.
/// `MyApp-2.3.1-arm64.pkg`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    /// Apple Silicon.
    Arm64,
    /// Intel 64-bit.
    X86_64,
    /// Fat binary carrying both slices.
    Universal,
    /// Neither slice recognised. Only produced under the tolerant policy.
    Unknown,
}

impl Arch {
    /// File-name / `hostArchitectures` spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::X86_64 => "x86_64",
            Arch::Universal => "universal",
            Arch::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_selects_variant_by_extension() {
        assert!(matches!(
            InputArtifact::from_path("/tmp/MyApp.app"),
            Ok(InputArtifact::AppBundle(_))
        ));
        assert!(matches!(
            InputArtifact::from_path("/tmp/MyApp.DMG"),
            Ok(InputArtifact::DiskImage(_))
        ));
        assert!(matches!(
            InputArtifact::from_path("MyApp.zip"),
            Ok(InputArtifact::ZipArchive(_))
        ));
        assert!(matches!(
            InputArtifact::from_path("MyApp.tbz"),
            Ok(InputArtifact::TbzArchive(_))
        ));
    }

    #[test]
    fn test_from_path_rejects_other_extensions() {
        for path in ["MyApp.pkg", "MyApp.tar.gz", "MyApp"] {
            assert!(matches!(
                InputArtifact::from_path(path),
                Err(Error::UnsupportedInput { .. })
            ));
        }
    }

    #[test]
    fn test_arch_display() {
        assert_eq!(Arch::Arm64.to_string(), "arm64");
        assert_eq!(Arch::X86_64.to_string(), "x86_64");
        assert_eq!(Arch::Universal.to_string(), "universal");
    }
}
