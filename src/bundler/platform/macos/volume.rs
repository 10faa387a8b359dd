//! Disk image attach/detach via `hdiutil`.
//!
//! Images carrying a Software License Agreement prompt for interactive
//! acknowledgment on attach. Instead of answering the prompt, such images are
//! converted to a read-write (UDRW) image first, which drops the agreement
//! resource, and the converted image atomically replaces the original.
//!
//! Volumes are attached read-only, hidden from Finder, and under a random
//! directory below the configured mount root so concurrent runs never share
//! a mount point.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::log::RunLog;
use crate::bundler::process::{ToolCommand, ToolRunner, run_checked, run_logged};
use crate::bundler::settings::Settings;
use crate::bundler::utils::fs;
use plist::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wait_timeout::ChildExt;

const LICENSE_KEY: &str = "Software License Agreement";

/// A disk image attached for the duration of one run.
///
/// Detach with [`unmount`]. A volume dropped without being detached (for
/// example while unwinding a panic) is force-detached synchronously.
#[derive(Debug)]
pub struct MountedVolume {
    dmg_path: PathBuf,
    mount_point: PathBuf,
    hdiutil: PathBuf,
    detached: bool,
}

impl MountedVolume {
    /// Where the volume is mounted.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

impl Drop for MountedVolume {
    fn drop(&mut self) {
        if self.detached {
            return;
        }

        let mut child = match std::process::Command::new(&self.hdiutil)
            .arg("detach")
            .arg(&self.mount_point)
            .arg("-force")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(_) => return,
        };

        match child.wait_timeout(Duration::from_secs(10)) {
            Ok(Some(_)) => {}
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "Timed out force-detaching {}",
                    self.mount_point.display()
                );
            }
        }
    }
}

/// Whether the image carries a Software License Agreement.
pub async fn has_license_agreement<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    dmg: &Path,
    log: &RunLog,
) -> Result<bool> {
    let output = run_checked(
        runner,
        ToolCommand::new(&settings.tools().hdiutil)
            .args(["imageinfo", "-plist"])
            .arg(dmg),
        log,
    )
    .await?;
    parse_license_flag(&output.stdout)
}

/// Converts a licence-gated image in place.
///
/// Returns `false` (and leaves the file untouched) when the image carries no
/// agreement. The conversion is written to a sibling temp file, then renamed
/// over the original.
pub async fn convert_licensed_image<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    dmg: &Path,
    log: &RunLog,
) -> Result<bool> {
    if !has_license_agreement(settings, runner, dmg, log).await? {
        return Ok(false);
    }

    log.info(format_args!(
        "{} carries a license agreement, converting to UDRW",
        dmg.display()
    ));

    let converted = dmg.with_extension("sla-converted.dmg");
    fs::remove_file_if_exists(&converted).await?;

    let result = run_checked(
        runner,
        ToolCommand::new(&settings.tools().hdiutil)
            .arg("convert")
            .arg(dmg)
            .args(["-format", "UDRW", "-o"])
            .arg(&converted),
        log,
    )
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file_if_exists(&converted).await;
        return Err(e);
    }

    tokio::fs::rename(&converted, dmg)
        .await
        .fs_context("replacing disk image with converted copy", dmg)?;
    Ok(true)
}

/// Attaches `dmg`, converting it first if it is licence-gated.
pub async fn mount<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    dmg: &Path,
    log: &RunLog,
) -> Result<MountedVolume> {
    convert_licensed_image(settings, runner, dmg, log).await?;

    let hdiutil = settings.tools().hdiutil.clone();
    let output = run_checked(
        runner,
        ToolCommand::new(&hdiutil)
            .args([
                "attach",
                "-plist",
                "-nobrowse",
                "-readonly",
                "-noverify",
                "-noautoopen",
                "-mountrandom",
            ])
            .arg(settings.mount_root())
            .arg(dmg),
        log,
    )
    .await?;

    let mount_point = parse_mount_point(&output.stdout)?.ok_or_else(|| Error::MountPointNotFound {
        dmg: dmg.to_path_buf(),
    })?;

    log.info(format_args!(
        "Mounted {} at {}",
        dmg.display(),
        mount_point.display()
    ));

    Ok(MountedVolume {
        dmg_path: dmg.to_path_buf(),
        mount_point,
        hdiutil,
        detached: false,
    })
}

/// Detaches `volume`, retrying once with `-force`. Never fails.
pub async fn unmount<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    mut volume: MountedVolume,
    log: &RunLog,
) {
    let detach = ToolCommand::new(&settings.tools().hdiutil)
        .arg("detach")
        .arg(&volume.mount_point);

    let detached = match run_logged(runner, detach.clone(), log).await {
        Ok(output) if output.is_success() => true,
        _ => matches!(
            run_logged(runner, detach.arg("-force"), log).await,
            Ok(output) if output.is_success()
        ),
    };

    if detached {
        log.debug(format_args!("Detached {}", volume.mount_point.display()));
    } else {
        log.warn(format_args!(
            "Could not detach {} (from {})",
            volume.mount_point.display(),
            volume.dmg_path.display()
        ));
    }

    // One attempt is all cleanup gets; the drop guard must not retry.
    volume.detached = true;
}

/// Extracts the XML plist from tool output that may carry leading noise.
fn parse_plist_output(stdout: &str) -> Result<Value> {
    let start = stdout
        .find("<?xml")
        .or_else(|| stdout.find("<plist"))
        .ok_or_else(|| Error::GenericError("hdiutil output contained no plist".into()))?;
    Ok(Value::from_reader_xml(stdout[start..].as_bytes())?)
}

/// Reads `Properties › Software License Agreement` from `imageinfo -plist`.
pub(crate) fn parse_license_flag(stdout: &str) -> Result<bool> {
    let value = parse_plist_output(stdout)?;
    Ok(value
        .as_dictionary()
        .and_then(|d| d.get("Properties"))
        .and_then(Value::as_dictionary)
        .and_then(|p| p.get(LICENSE_KEY))
        .and_then(Value::as_boolean)
        .unwrap_or(false))
}

/// First `mount-point` among `system-entities` in `attach -plist` output.
pub(crate) fn parse_mount_point(stdout: &str) -> Result<Option<PathBuf>> {
    let value = parse_plist_output(stdout)?;
    Ok(value
        .as_dictionary()
        .and_then(|d| d.get("system-entities"))
        .and_then(Value::as_array)
        .and_then(|entities| {
            entities.iter().find_map(|entity| {
                entity
                    .as_dictionary()
                    .and_then(|e| e.get("mount-point"))
                    .and_then(Value::as_string)
                    .map(PathBuf::from)
            })
        }))
}
