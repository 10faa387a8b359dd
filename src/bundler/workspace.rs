//! Per-run scratch space.
//!
//! A [`BuildWorkspace`] owns one randomly named directory plus every disk
//! image mounted during the run. [`BuildWorkspace::cleanup`] consumes the
//! workspace, detaches the volumes and then deletes the directory, so it can
//! only run once.
//!
//! ```text
//! kodegen-pkg-XXXXXX/
//! ├── extract-0/            archive scratch (one per input)
//! ├── root/                 standard/vendor package root
//! ├── root-arm64/           universal roots
//! ├── root-x86_64/
//! ├── scripts/              vendor postinstall
//! ├── component*.plist
//! ├── components/           built component packages (--package-path)
//! └── distribution.xml
//! ```

use crate::bundler::error::{ErrorExt, Result};
use crate::bundler::log::RunLog;
use crate::bundler::platform::macos::volume::{self, MountedVolume};
use crate::bundler::process::ToolRunner;
use crate::bundler::settings::Settings;
use crate::bundler::utils::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "kodegen-pkg-";

/// Temp directory and mounted volumes exclusively owned by one run.
#[derive(Debug)]
pub struct BuildWorkspace {
    dir: TempDir,
    mounts: Vec<MountedVolume>,
}

impl BuildWorkspace {
    /// Creates a fresh workspace under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).fs_context("creating workspace root", root)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .fs_context("creating build workspace in", root)?;
        Ok(Self {
            dir,
            mounts: Vec::new(),
        })
    }

    /// Workspace directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Fresh (emptied) scratch directory for extracting input `index`.
    pub async fn scratch_dir(&self, index: usize) -> Result<PathBuf> {
        let dir = self.path().join(format!("extract-{index}"));
        fs::create_dir_all(&dir, true).await?;
        Ok(dir)
    }

    /// Package root for a component. `None` is the single-component root.
    pub fn root_dir(&self, label: Option<&str>) -> PathBuf {
        match label {
            Some(label) => self.path().join(format!("root-{label}")),
            None => self.path().join("root"),
        }
    }

    /// Directory holding install scripts.
    pub fn scripts_dir(&self) -> PathBuf {
        self.path().join("scripts")
    }

    /// Component property list path.
    pub fn component_plist(&self, label: Option<&str>) -> PathBuf {
        match label {
            Some(label) => self.path().join(format!("component-{label}.plist")),
            None => self.path().join("component.plist"),
        }
    }

    /// Directory passed to `productbuild --package-path`.
    pub fn components_dir(&self) -> PathBuf {
        self.path().join("components")
    }

    /// Distribution descriptor path.
    pub fn distribution_xml(&self) -> PathBuf {
        self.path().join("distribution.xml")
    }

    /// Takes ownership of a mounted volume so cleanup detaches it.
    pub fn track_mount(&mut self, volume: MountedVolume) -> &MountedVolume {
        self.mounts.push(volume);
        &self.mounts[self.mounts.len() - 1]
    }

    /// Detaches every tracked volume (most recent first), then deletes the
    /// workspace directory. Failures are logged, never returned.
    pub async fn cleanup<R: ToolRunner>(mut self, settings: &Settings, runner: &R, log: &RunLog) {
        while let Some(volume) = self.mounts.pop() {
            volume::unmount(settings, runner, volume, log).await;
        }

        let path = self.dir.path().to_path_buf();
        let dir = self.dir;
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => log.debug(format_args!("removed workspace {}", path.display())),
            Ok(Err(e)) => log.warn(format_args!(
                "failed to remove workspace {}: {}",
                path.display(),
                e
            )),
            Err(e) => log.warn(format_args!(
                "workspace removal task for {} failed: {}",
                path.display(),
                e
            )),
        }
    }
}
