//! Recursive search for application and framework bundles.

use crate::bundler::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory extensions that mark a bundle.
pub const BUNDLE_EXTENSIONS: &[&str] = &["app", "framework"];

/// Whether `path` names a bundle directory (`.app` / `.framework`).
///
/// Symlinks are never bundles for this purpose.
pub fn is_bundle_dir(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            BUNDLE_EXTENSIONS
                .iter()
                .any(|b| ext.eq_ignore_ascii_case(b))
        });

    has_extension
        && std::fs::symlink_metadata(path)
            .map(|m| m.is_dir())
            .unwrap_or(false)
}

/// Finds the first bundle under `root`, at most `max_depth` levels deep.
///
/// Does not descend into a bundle once found, does not follow symlinks, and
/// visits entries in file-name order. `root` itself is returned if it is a
/// bundle. Which bundle wins among several candidates is otherwise
/// unspecified; callers wanting a particular one should narrow `root`.
pub fn find_bundle(root: &Path, max_depth: usize) -> Result<PathBuf> {
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            // Unreadable subtrees (e.g. permission-restricted volume folders) are skipped.
            Err(e) => {
                log::debug!("skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_dir() && is_bundle_dir(entry.path()) {
            return Ok(entry.into_path());
        }
    }

    Err(Error::BundleNotFound {
        root: root.to_path_buf(),
    })
}

/// [`find_bundle`] on the blocking pool, for walking mounted volumes and
/// extraction trees from async code.
pub async fn locate_bundle(root: &Path, max_depth: usize) -> Result<PathBuf> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || find_bundle(&root, max_depth))
        .await
        .map_err(|e| Error::GenericError(format!("bundle search task failed: {e}")))?
}
