//! Adobe-style vendor installers.
//!
//! A vendor distribution ships a driver bundle (usually `Install.app`) next
//! to a `products/` directory whose `driver.xml` names the product:
//!
//! ```xml
//! <DriverInfo>
//!   <ProductInfo>
//!     <Name>Photoshop</Name>
//!     <ProductVersion>25.0</ProductVersion>
//!     <Platform>macarm64</Platform>
//!   </ProductInfo>
//! </DriverInfo>
//! ```
//!
//! The package built from it stages the driver and all of its siblings in a
//! temporary install target, and a postinstall script runs the driver
//! silently and removes the target afterwards.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::platform::Arch;
use crate::bundler::settings::VendorSettings;
use crate::bundler::utils::fs;
use handlebars::Handlebars;
use plist::Value;
use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};

use super::metadata::{PackageInfo, info_plist_path};

/// Manifest location relative to the directory holding the driver bundle.
pub const MANIFEST_PATH: &str = "products/driver.xml";

/// Executable run when the driver's `Info.plist` names none.
pub const DEFAULT_DRIVER_EXECUTABLE: &str = "Install";

const POSTINSTALL_TEMPLATE: &str = r#"#!/bin/sh
# Runs the staged {{name}} installer, then removes the staging directory.
{{driver}} --mode=silent
status=$?
rm -rf {{target}}
exit $status
"#;

/// Product identity read from `driver.xml`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VendorManifest {
    /// Product name.
    pub name: String,
    /// Architecture mapped from the platform code.
    pub architecture: Arch,
    /// Product version.
    pub version: String,
}

/// Maps a vendor platform code to an architecture.
///
/// # Errors
///
/// [`Error::UnmappedPlatform`] for any code other than `macarm64`, `osx10`
/// and `osx10-64`.
pub fn map_platform(code: &str) -> Result<Arch> {
    match code.trim() {
        "macarm64" => Ok(Arch::Arm64),
        "osx10" | "osx10-64" => Ok(Arch::X86_64),
        other => Err(Error::UnmappedPlatform(other.to_string())),
    }
}

/// Parses manifest text. `<ProductInfo>` is searched first, then the whole
/// document. The version comes from `ProductVersion`, else `CodexVersion`.
pub fn parse_manifest(xml: &str) -> Result<VendorManifest> {
    let section_re = Regex::new(r"(?s)<ProductInfo>(.*?)</ProductInfo>")?;
    let section = section_re
        .captures(xml)
        .and_then(|c| c.get(1))
        .map_or(xml, |m| m.as_str());

    let name = element(section, "Name")?
        .ok_or_else(|| Error::GenericError("vendor manifest has no <Name>".into()))?;
    let version = match element(section, "ProductVersion")? {
        Some(v) => v,
        None => element(section, "CodexVersion")?
            .ok_or_else(|| Error::GenericError("vendor manifest has no <ProductVersion>".into()))?,
    };
    let platform = element(section, "Platform")?
        .ok_or_else(|| Error::GenericError("vendor manifest has no <Platform>".into()))?;

    Ok(VendorManifest {
        name,
        architecture: map_platform(&platform)?,
        version,
    })
}

/// Trimmed, non-empty text of the first `<tag>` element.
fn element(xml: &str, tag: &str) -> Result<Option<String>> {
    let re = Regex::new(&format!(r"(?s)<{tag}>\s*(.*?)\s*</{tag}>"))?;
    Ok(re
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty()))
}

/// Manifest path for a driver bundle.
pub fn manifest_path(bundle: &Path) -> PathBuf {
    bundle
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(MANIFEST_PATH)
}

/// Reads and parses the manifest beside `bundle`.
pub async fn read_manifest(bundle: &Path) -> Result<VendorManifest> {
    let path = manifest_path(bundle);
    let xml = tokio::fs::read_to_string(&path)
        .await
        .fs_context("reading vendor manifest", &path)?;
    parse_manifest(&xml)
}

/// `prefix` + lowercase name with runs of other characters collapsed to `-`.
///
/// `"Photoshop 2024"` with the default prefix is `com.adobe.photoshop-2024`.
pub fn vendor_identifier(prefix: &str, name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    format!("{prefix}{slug}")
}

/// Where the driver is staged on the installing machine.
pub fn install_target(settings: &VendorSettings, name: &str) -> PathBuf {
    settings
        .install_target
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("/tmp/{name}-installer")))
}

/// Package identity for a vendor build.
pub async fn read_vendor_info(settings: &VendorSettings, bundle: &Path) -> Result<PackageInfo> {
    let manifest = read_manifest(bundle).await?;
    Ok(PackageInfo {
        identifier: vendor_identifier(&settings.identifier_prefix, &manifest.name),
        name: manifest.name,
        version: manifest.version,
        architecture: manifest.architecture,
    })
}

/// `CFBundleExecutable` of the driver, defaulting to `Install`.
///
/// Driver bundles often carry sparse property lists, so a missing or
/// unreadable one is not an error.
pub fn driver_executable(bundle: &Path) -> String {
    Value::from_file(info_plist_path(bundle))
        .ok()
        .and_then(|v| {
            v.as_dictionary()
                .and_then(|d| d.get("CFBundleExecutable"))
                .and_then(Value::as_string)
                .map(str::to_string)
        })
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DRIVER_EXECUTABLE.to_string())
}

/// Single-quotes `s` for `/bin/sh`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Renders the postinstall script.
pub fn render_postinstall(
    name: &str,
    target: &Path,
    bundle_name: &str,
    executable: &str,
) -> Result<String> {
    let driver = target
        .join(bundle_name)
        .join("Contents")
        .join("MacOS")
        .join(executable);

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    let script = handlebars.render_template(
        POSTINSTALL_TEMPLATE,
        &json!({
            "name": name.replace('\n', " "),
            "driver": shell_quote(&driver.to_string_lossy()),
            "target": shell_quote(&target.to_string_lossy()),
        }),
    )?;
    Ok(script)
}

/// Writes `scripts/postinstall` (mode 0755) into `scripts_dir`.
pub async fn write_postinstall(
    scripts_dir: &Path,
    name: &str,
    target: &Path,
    bundle: &Path,
) -> Result<PathBuf> {
    let bundle_name = bundle
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::GenericError(format!("{} has no file name", bundle.display())))?;
    let script = render_postinstall(name, target, &bundle_name, &driver_executable(bundle))?;

    let path = scripts_dir.join("postinstall");
    fs::write_executable(&path, &script).await?;
    Ok(path)
}
