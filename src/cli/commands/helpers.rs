//! Shared helper functions for command execution.

use crate::bundler::InputArtifact;
use crate::error::{CliError, PackagerError, Result};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Classifies an input by extension and makes it absolute.
///
/// Runs before the tool preflight so a wrong extension is reported as such
/// even on machines without the packaging tools.
pub(super) fn resolve_input(path: &Path) -> Result<PathBuf> {
    InputArtifact::from_path(path)?;
    Ok(path.absolutize()?.into_owned())
}

/// Absolute form of an optional output directory.
pub(super) fn resolve_output_dir(path: Option<&Path>) -> Result<Option<PathBuf>> {
    Ok(match path {
        Some(path) => Some(path.absolutize()?.into_owned()),
        None => None,
    })
}

/// Checks every tool resolves on `PATH` (or exists, for absolute paths).
pub(super) fn preflight<'a>(tools: impl IntoIterator<Item = &'a Path>) -> Result<()> {
    let missing: Vec<String> = tools
        .into_iter()
        .filter(|tool| match which::which(tool) {
            Ok(path) => {
                log::debug!("Found {} at {}", tool.display(), path.display());
                false
            }
            Err(e) => {
                log::debug!("{} not found: {}", tool.display(), e);
                true
            }
        })
        .map(|tool| tool.display().to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PackagerError::Cli(CliError::MissingTools { tools: missing }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_input_rejects_extension_first() {
        let err = resolve_input(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(
            err,
            PackagerError::Bundler(crate::bundler::Error::UnsupportedInput { .. })
        ));
        assert!(resolve_input(Path::new("MyApp.zip")).expect("zip").is_absolute());
    }

    #[test]
    fn test_preflight_reports_every_missing_tool() {
        let err = preflight([
            Path::new("kodegen-no-such-tool-a"),
            Path::new("kodegen-no-such-tool-b"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            PackagerError::Cli(CliError::MissingTools { ref tools }) if tools.len() == 2
        ));
    }
}
