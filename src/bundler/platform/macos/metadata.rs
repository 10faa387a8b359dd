//! Application identity and architecture from a bundle's `Info.plist`.

use crate::bundler::error::{Error, Result};
use crate::bundler::log::RunLog;
use crate::bundler::platform::Arch;
use crate::bundler::process::{ToolCommand, ToolRunner, run_checked};
use crate::bundler::settings::{ArchitecturePolicy, Settings};
use plist::Value;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Identity of the application being packaged. Populated once per run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PackageInfo {
    /// Display name, used in the output file name and installer title.
    pub name: String,
    /// Component identifier (`CFBundleIdentifier` or vendor-derived).
    pub identifier: String,
    /// Marketing version.
    pub version: String,
    /// Architecture of the main executable.
    pub architecture: Arch,
}

/// Keys read from `Info.plist`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BundlePlist {
    /// `CFBundleDisplayName`, else `CFBundleName`.
    pub name: String,
    /// `CFBundleIdentifier`
    pub identifier: String,
    /// `CFBundleShortVersionString`
    pub version: String,
    /// `CFBundleExecutable`, when present.
    pub executable: Option<String>,
}

/// `Contents/Info.plist` of `bundle`.
pub fn info_plist_path(bundle: &Path) -> PathBuf {
    bundle.join("Contents").join("Info.plist")
}

/// Reads the bundle's identity keys.
///
/// # Errors
///
/// [`Error::MissingPlistKey`] when the name, identifier or version is absent
/// or empty.
pub fn read_bundle_plist(bundle: &Path) -> Result<BundlePlist> {
    let path = info_plist_path(bundle);
    let value = Value::from_file(&path)?;
    let dict = value.as_dictionary().ok_or_else(|| {
        Error::GenericError(format!("{} is not a dictionary", path.display()))
    })?;

    let string = |key: &str| {
        dict.get(key)
            .and_then(Value::as_string)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let missing = |key: &'static str| Error::MissingPlistKey {
        key,
        plist: path.clone(),
    };

    let name = string("CFBundleDisplayName")
        .or_else(|| string("CFBundleName"))
        .ok_or_else(|| missing("CFBundleName"))?;
    let identifier = string("CFBundleIdentifier").ok_or_else(|| missing("CFBundleIdentifier"))?;
    let version =
        string("CFBundleShortVersionString").ok_or_else(|| missing("CFBundleShortVersionString"))?;

    Ok(BundlePlist {
        name,
        identifier,
        version,
        executable: string("CFBundleExecutable"),
    })
}

/// Classifies `file(1)` output by the architecture tokens it mentions.
pub fn classify_architecture(file_output: &str) -> Arch {
    let arm = file_output.contains("arm64");
    let intel = file_output.contains("x86_64");
    match (arm, intel) {
        (true, true) => Arch::Universal,
        (true, false) => Arch::Arm64,
        (false, true) => Arch::X86_64,
        (false, false) => Arch::Unknown,
    }
}

/// Detects the main executable's architecture with `file`.
///
/// Under [`ArchitecturePolicy::Strict`] an unrecognised executable (or a
/// bundle without `CFBundleExecutable`) is [`Error::UnknownArchitecture`];
/// under `Tolerant` it is [`Arch::Unknown`].
pub async fn detect_architecture<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    bundle: &Path,
    executable: Option<&str>,
    log: &RunLog,
) -> Result<Arch> {
    let exe_path = bundle
        .join("Contents")
        .join("MacOS")
        .join(executable.unwrap_or_default());

    let arch = match executable {
        Some(_) => {
            let output = run_checked(
                runner,
                ToolCommand::new(&settings.tools().file).arg(&exe_path),
                log,
            )
            .await?;
            classify_architecture(&output.stdout)
        }
        None => Arch::Unknown,
    };

    if arch == Arch::Unknown {
        match settings.architecture_policy() {
            ArchitecturePolicy::Strict => {
                return Err(Error::UnknownArchitecture {
                    executable: exe_path,
                });
            }
            ArchitecturePolicy::Tolerant => log.warn(format_args!(
                "Could not determine architecture of {}, continuing as unknown",
                exe_path.display()
            )),
        }
    }

    Ok(arch)
}

/// Reads identity and architecture for a standard or universal build.
pub async fn read_package_info<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    bundle: &Path,
    log: &RunLog,
) -> Result<PackageInfo> {
    let plist = read_bundle_plist(bundle)?;
    let architecture =
        detect_architecture(settings, runner, bundle, plist.executable.as_deref(), log).await?;

    log.info(format_args!(
        "{} {} ({}) is {}",
        plist.name, plist.version, plist.identifier, architecture
    ));

    Ok(PackageInfo {
        name: plist.name,
        identifier: plist.identifier,
        version: plist.version,
        architecture,
    })
}
