//! File system utilities for staging package roots.
//!
//! Bundles are copied verbatim: symlinks are recreated rather than followed
//! (frameworks inside `.app` bundles rely on `Versions/Current` links) and
//! permission bits travel with `tokio::fs::copy`.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::os::unix::fs::PermissionsExt;
use std::{io, path::Path};
use tokio::fs;

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        remove_dir_all(path).await?;
    }
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context("removing directory", path),
    }
}

/// Removes a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).fs_context("removing file", path),
    }
}

/// Makes a symbolic link.
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Symlinks are recreated with their original target. Fails if the source
/// is not a directory.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(from)
        .await
        .fs_context("reading metadata of", from)?;
    if !meta.is_dir() {
        return Err(Error::GenericError(format!(
            "{} is not a directory",
            from.display()
        )));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }

    for entry in walkdir::WalkDir::new(from).follow_links(false) {
        let entry = entry?;
        let rel_path = entry.path().strip_prefix(from)?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())
                .await
                .fs_context("reading symlink", entry.path())?;
            symlink(&target, &dest_path).fs_context("creating symlink", &dest_path)?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .fs_context("creating directory", &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .fs_context("copying file", entry.path())?;
        }
    }

    Ok(())
}

/// Copies a file, directory or symlink to `to`.
pub async fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(from)
        .await
        .fs_context("reading metadata of", from)?;

    if meta.is_dir() {
        copy_dir(from, to).await
    } else if meta.file_type().is_symlink() {
        let target = fs::read_link(from).await.fs_context("reading symlink", from)?;
        symlink(&target, to).fs_context("creating symlink", to)
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .fs_context("creating directory", parent)?;
        }
        fs::copy(from, to).await.fs_context("copying file", from)?;
        Ok(())
    }
}

/// Writes `contents` to `path` and marks it executable (0755).
pub async fn write_executable(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }
    fs::write(path, contents)
        .await
        .fs_context("writing script", path)?;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .fs_context("setting executable permissions", path)
}
