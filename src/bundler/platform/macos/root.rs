//! Package root staging.
//!
//! A package root mirrors the target file system: whatever sits at
//! `root/Applications/MyApp.app` installs to `/Applications/MyApp.app`.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::log::RunLog;
use crate::bundler::utils::fs;
use std::path::{Component, Path, PathBuf};

/// Install location of application bundles.
pub const APPLICATIONS_DIR: &str = "Applications";

fn bundle_file_name(bundle: &Path) -> Result<&std::ffi::OsStr> {
    bundle
        .file_name()
        .ok_or_else(|| Error::GenericError(format!("{} has no file name", bundle.display())))
}

/// Copies `bundle` to `root/Applications/<bundle name>`. `root` is recreated.
pub async fn stage_application(bundle: &Path, root: &Path, log: &RunLog) -> Result<PathBuf> {
    fs::create_dir_all(root, true).await?;
    let dest = root.join(APPLICATIONS_DIR).join(bundle_file_name(bundle)?);

    log.info(format_args!(
        "Staging {} at {}",
        bundle.display(),
        dest.display()
    ));
    fs::copy_dir(bundle, &dest).await?;
    Ok(dest)
}

/// Maps an absolute install target into `root`.
///
/// `/tmp/Photoshop-installer` under `root` becomes
/// `root/tmp/Photoshop-installer`. Parent components are rejected.
pub fn target_in_root(root: &Path, target: &Path) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for component in target.components() {
        match component {
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::Normal(part) => path.push(part),
            Component::ParentDir => {
                return Err(Error::GenericError(format!(
                    "install target {} must not contain '..'",
                    target.display()
                )));
            }
        }
    }
    if path == root {
        return Err(Error::GenericError(format!(
            "install target {} resolves to the package root",
            target.display()
        )));
    }
    Ok(path)
}

/// Copies `bundle` and every sibling entry into `root/<target>`.
///
/// The vendor driver resolves its payload relative to itself, so the whole
/// directory that holds it travels together.
pub async fn stage_vendor(
    bundle: &Path,
    root: &Path,
    target: &Path,
    log: &RunLog,
) -> Result<PathBuf> {
    fs::create_dir_all(root, true).await?;
    let dest = target_in_root(root, target)?;
    fs::create_dir_all(&dest, false).await?;

    let source_dir = bundle
        .parent()
        .ok_or_else(|| Error::GenericError(format!("{} has no parent", bundle.display())))?;

    let mut reader = tokio::fs::read_dir(source_dir)
        .await
        .fs_context("reading vendor directory", source_dir)?;
    let mut copied = 0usize;
    while let Some(entry) = reader
        .next_entry()
        .await
        .fs_context("reading vendor directory", source_dir)?
    {
        fs::copy_entry(&entry.path(), &dest.join(entry.file_name())).await?;
        copied += 1;
    }

    log.info(format_args!(
        "Staged {} vendor entries from {} at {}",
        copied,
        source_dir.display(),
        dest.display()
    ));
    Ok(dest)
}
