//! Zip and tbz expansion.
//!
//! Archives are expanded with the system tools (`ditto` keeps resource forks,
//! extended attributes and symlinks intact, which `.app` bundles depend on).

use crate::bundler::error::{ErrorExt, Result};
use crate::bundler::log::RunLog;
use crate::bundler::process::{ToolCommand, ToolRunner, run_checked};
use crate::bundler::settings::Settings;
use crate::bundler::utils::fs;
use std::path::{Path, PathBuf};

use super::locator::is_bundle_dir;

/// Archive formats the extractor understands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// `.tbz` (tar + bzip2)
    Tbz,
}

/// Expands `archive` into `dest`, which is cleared first.
///
/// Returns `dest` for chaining.
pub async fn extract<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    archive: &Path,
    kind: ArchiveKind,
    dest: &Path,
    log: &RunLog,
) -> Result<PathBuf> {
    fs::create_dir_all(dest, true).await?;

    let command = match kind {
        ArchiveKind::Zip => ToolCommand::new(&settings.tools().ditto)
            .args(["-x", "-k"])
            .arg(archive)
            .arg(dest),
        ArchiveKind::Tbz => ToolCommand::new(&settings.tools().tar)
            .arg("-xjf")
            .arg(archive)
            .arg("-C")
            .arg(dest),
    };

    log.info(format_args!(
        "Extracting {} into {}",
        archive.display(),
        dest.display()
    ));
    run_checked(runner, command, log).await?;
    Ok(dest.to_path_buf())
}

/// First top-level entry of `root` that is a bundle directory.
pub async fn immediate_bundle(root: &Path) -> Result<Option<PathBuf>> {
    Ok(sorted_entries(root)
        .await?
        .into_iter()
        .find(|path| is_bundle_dir(path)))
}

/// First top-level `.dmg` file in `root`.
pub async fn immediate_disk_image(root: &Path) -> Result<Option<PathBuf>> {
    Ok(sorted_entries(root).await?.into_iter().find(|path| {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("dmg"))
    }))
}

/// Top-level entries of `root`, skipping `__MACOSX` metadata, in name order.
async fn sorted_entries(root: &Path) -> Result<Vec<PathBuf>> {
    let mut reader = tokio::fs::read_dir(root)
        .await
        .fs_context("reading extraction root", root)?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .fs_context("reading extraction root", root)?
    {
        if entry.file_name() == "__MACOSX" {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}
