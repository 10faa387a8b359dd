//! Inspection of built packages.
//!
//! Two read-only checks that run against a finished `.pkg`: Gatekeeper
//! assessment with `spctl`, and a look inside the product archive with
//! `pkgutil --expand` to confirm which components it references.

use crate::bundler::builder::BuiltPackage;
use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::log::RunLog;
use crate::bundler::platform::Arch;
use crate::bundler::process::{ToolCommand, ToolRunner, run_checked, run_logged};
use crate::bundler::settings::Settings;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

/// Result of `spctl --assess --type install`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SignatureAssessment {
    /// Gatekeeper would allow installation.
    pub accepted: bool,
    /// `source=` line, e.g. `Notarized Developer ID` or `no usable signature`.
    pub source: Option<String>,
    /// `origin=` line: the signing identity.
    pub origin: Option<String>,
}

/// Parses `spctl -vv` output. `exit_ok` is whether spctl exited 0.
pub fn parse_assessment(output: &str, exit_ok: bool) -> SignatureAssessment {
    let field = |name: &str| {
        output.lines().find_map(|line| {
            line.trim()
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|v| v.trim().to_string())
        })
    };
    SignatureAssessment {
        accepted: exit_ok && output.contains(": accepted"),
        source: field("source"),
        origin: field("origin"),
    }
}

/// Runs the Gatekeeper assessment. Rejection is a result, not an error.
pub async fn assess_signature<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    package: &Path,
    log: &RunLog,
) -> Result<SignatureAssessment> {
    let output = run_logged(
        runner,
        ToolCommand::new(&settings.tools().spctl)
            .args(["--assess", "--type", "install", "-vv"])
            .arg(package),
        log,
    )
    .await?;
    Ok(parse_assessment(&output.combined(), output.is_success()))
}

/// One `<pkg-ref>` with both `id` and `version`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PackageRef {
    /// Component identifier.
    pub identifier: String,
    /// Component version.
    pub version: String,
}

fn refers_to(reference: &str, identifier: &str) -> bool {
    match reference.strip_prefix(identifier) {
        Some("") => true,
        Some(suffix) => [Arch::Arm64, Arch::X86_64]
            .iter()
            .any(|arch| suffix.strip_prefix('.') == Some(arch.as_str())),
        None => false,
    }
}

/// Components referenced by a product archive's `Distribution`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PackageContents {
    /// Distinct pkg-refs in document order.
    pub refs: Vec<PackageRef>,
}

impl PackageContents {
    /// Whether a ref for `identifier`, or its `.arm64` / `.x86_64` component
    /// of a universal package, carries `version`.
    pub fn matches(&self, identifier: &str, version: &str) -> bool {
        self.refs
            .iter()
            .any(|r| r.version == version && refers_to(&r.identifier, identifier))
    }

    /// Checks the archive references what `package` says it was built from.
    pub fn verify(&self, package: &BuiltPackage) -> Result<()> {
        for id in &package.components {
            let found = self.refs.iter().find(|r| &r.identifier == id);
            match found {
                Some(r) if r.version == package.version => {}
                Some(r) => {
                    return Err(Error::GenericError(format!(
                        "{} references {} version {}, expected {}",
                        package.path.display(),
                        id,
                        r.version,
                        package.version
                    )));
                }
                None => {
                    return Err(Error::GenericError(format!(
                        "{} does not reference component {}",
                        package.path.display(),
                        id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Extracts the pkg-refs of a `Distribution` document.
pub fn parse_distribution(xml: &str) -> Result<PackageContents> {
    let element_re = Regex::new(r"<pkg-ref\b([^>]*)>")?;
    let id_re = Regex::new(r#"\bid="([^"]*)""#)?;
    let version_re = Regex::new(r#"\bversion="([^"]*)""#)?;

    let mut contents = PackageContents::default();
    for caps in element_re.captures_iter(xml) {
        let attrs = &caps[1];
        let (Some(id), Some(version)) = (id_re.captures(attrs), version_re.captures(attrs)) else {
            continue;
        };
        let package_ref = PackageRef {
            identifier: id[1].to_string(),
            version: version[1].to_string(),
        };
        if !contents.refs.contains(&package_ref) {
            contents.refs.push(package_ref);
        }
    }
    Ok(contents)
}

/// Expands `package` into a temp directory and reads its `Distribution`.
pub async fn read_contents<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    package: &Path,
    log: &RunLog,
) -> Result<PackageContents> {
    let scratch = tempfile::Builder::new()
        .prefix("kodegen-pkg-inspect-")
        .tempdir_in(settings.workspace_root())
        .fs_context("creating inspection directory in", settings.workspace_root())?;
    // pkgutil refuses to expand into an existing directory.
    let expanded = scratch.path().join("expanded");

    run_checked(
        runner,
        ToolCommand::new(&settings.tools().pkgutil)
            .arg("--expand")
            .arg(package)
            .arg(&expanded),
        log,
    )
    .await?;

    let distribution = expanded.join("Distribution");
    let xml = tokio::fs::read_to_string(&distribution)
        .await
        .fs_context("reading", &distribution)?;
    parse_distribution(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_accepted_assessment() {
        let output = "/tmp/MyApp-2.3.1-arm64.pkg: accepted\nsource=Notarized Developer ID\norigin=Developer ID Installer: Example Corp (ABCDE12345)\n";
        let assessment = parse_assessment(output, true);
        assert!(assessment.accepted);
        assert_eq!(assessment.source.as_deref(), Some("Notarized Developer ID"));
        assert_eq!(
            assessment.origin.as_deref(),
            Some("Developer ID Installer: Example Corp (ABCDE12345)")
        );
    }

    #[test]
    fn test_parse_rejected_assessment() {
        let output = "/tmp/MyApp-2.3.1-arm64.pkg: rejected\nsource=no usable signature\n";
        let assessment = parse_assessment(output, false);
        assert!(!assessment.accepted);
        assert_eq!(assessment.source.as_deref(), Some("no usable signature"));
        assert_eq!(assessment.origin, None);
    }

    const DISTRIBUTION: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<installer-gui-script minSpecVersion="2">
    <choice id="choice-arm64" visible="false" enabled="is_arm()" selected="is_arm()">
        <pkg-ref id="com.example.app.arm64" version="9.0" onConclusion="none">#App-arm64.pkg</pkg-ref>
    </choice>
    <choice id="choice-x86_64" visible="false" enabled="! is_arm()" selected="! is_arm()">
        <pkg-ref id="com.example.app.x86_64" version="9.0" onConclusion="none">#App-x86_64.pkg</pkg-ref>
    </choice>
    <pkg-ref id="com.example.app.arm64">
        <bundle-version/>
    </pkg-ref>
</installer-gui-script>"#;

    fn built(architecture: Arch, version: &str) -> BuiltPackage {
        BuiltPackage {
            path: PathBuf::from("/tmp/App-9.0-universal.pkg"),
            name: "App".into(),
            identifier: "com.example.app".into(),
            version: version.into(),
            architecture,
            components: match architecture {
                Arch::Universal => vec![
                    "com.example.app.arm64".into(),
                    "com.example.app.x86_64".into(),
                ],
                _ => vec!["com.example.app".into()],
            },
            size: 0,
            checksum: String::new(),
        }
    }

    #[test]
    fn test_parse_distribution_skips_refs_without_version() {
        let contents = parse_distribution(DISTRIBUTION).expect("parse");
        assert_eq!(contents.refs.len(), 2);
        assert_eq!(contents.refs[0].identifier, "com.example.app.arm64");
        assert!(contents.matches("com.example.app", "9.0"));
        assert!(!contents.matches("com.example.app", "8.0"));
        assert!(!contents.matches("com.example", "9.0"));
    }

    #[test]
    fn test_matches_only_exact_or_architecture_components() {
        let contents = PackageContents {
            refs: vec![PackageRef {
                identifier: "com.example.app.arm64".into(),
                version: "9.0".into(),
            }],
        };
        assert!(contents.matches("com.example.app", "9.0"));
        assert!(contents.matches("com.example.app.arm64", "9.0"));
        assert!(!contents.matches("com.example", "9.0"));
        assert!(!contents.matches("com.example.ap", "9.0"));
        assert!(!contents.matches("com.example.app.arm", "9.0"));
    }

    #[test]
    fn test_verify_universal() {
        let contents = parse_distribution(DISTRIBUTION).expect("parse");
        contents
            .verify(&built(Arch::Universal, "9.0"))
            .expect("verified");
        assert!(contents.verify(&built(Arch::Universal, "9.1")).is_err());
    }

    #[test]
    fn test_verify_single_component_missing_ref() {
        let contents = parse_distribution(DISTRIBUTION).expect("parse");
        assert!(contents.verify(&built(Arch::Arm64, "9.0")).is_err());
        assert!(contents.verify(&built(Arch::X86_64, "9.0")).is_err());
    }
}
