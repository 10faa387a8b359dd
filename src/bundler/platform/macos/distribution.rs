//! Distribution descriptors (`distribution.xml`).
//!
//! Single-component packages start from `productbuild --synthesize` output
//! and are patched in place. Universal packages are rendered from a template
//! because `--synthesize` cannot express architecture gating.
//!
//! Every descriptor restricts installation to the boot volume and the local
//! system domain.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::log::RunLog;
use crate::bundler::process::{ToolCommand, ToolRunner, run_checked};
use crate::bundler::settings::Settings;
use handlebars::{Handlebars, html_escape};
use regex::{NoExpand, Regex};
use serde::Serialize;
use std::path::Path;

/// Local-system-only install domains.
pub const DOMAINS_ELEMENT: &str =
    r#"<domains enable_anywhere="false" enable_currentUserHome="false" enable_localSystem="true"/>"#;

const UNIVERSAL_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<installer-gui-script minSpecVersion="2">
    <title>{{name}} {{version}}</title>
    <options customize="never" require-scripts="false" rootVolumeOnly="true" hostArchitectures="arm64,x86_64"/>
    <domains enable_anywhere="false" enable_currentUserHome="false" enable_localSystem="true"/>
    <script><![CDATA[
function is_arm() {
    return system.sysctl("machdep.cpu.brand_string").indexOf("Apple") !== -1;
}
]]></script>
    <choices-outline>
        <line choice="choice-arm64"/>
        <line choice="choice-x86_64"/>
    </choices-outline>
    <choice id="choice-arm64" title="{{name}} (Apple Silicon)" visible="false" enabled="is_arm()" selected="is_arm()">
        <pkg-ref id="{{identifier}}.arm64" version="{{version}}" onConclusion="none">{{arm64_package}}</pkg-ref>
    </choice>
    <choice id="choice-x86_64" title="{{name}} (Intel)" visible="false" enabled="! is_arm()" selected="! is_arm()">
        <pkg-ref id="{{identifier}}.x86_64" version="{{version}}" onConclusion="none">{{x86_64_package}}</pkg-ref>
    </choice>
</installer-gui-script>
"#;

/// Values substituted into the universal template.
#[derive(Debug, Serialize)]
pub struct UniversalDescriptor<'a> {
    /// Application name.
    pub name: &'a str,
    /// Shared identifier; per-architecture pkg-refs append `.arm64` / `.x86_64`.
    pub identifier: &'a str,
    /// Shared version.
    pub version: &'a str,
    /// File name of the arm64 component in the package path.
    pub arm64_package: &'a str,
    /// File name of the x86_64 component in the package path.
    pub x86_64_package: &'a str,
}

/// Renders the universal descriptor. Values are XML-escaped.
pub fn render_universal(descriptor: &UniversalDescriptor<'_>) -> Result<String> {
    let handlebars = Handlebars::new();
    Ok(handlebars.render_template(UNIVERSAL_TEMPLATE, descriptor)?)
}

/// Applies the title, domains and options patches. Idempotent.
pub fn patch_descriptor(xml: &str, name: &str, version: &str) -> Result<String> {
    let title = format!("<title>{} {}</title>", html_escape(name), html_escape(version));
    let xml = replace_or_insert(xml, r"(?s)<title>.*?</title>", &title)?;

    let xml = replace_or_insert(&xml, r"<domains\b[^>]*?/>|(?s)<domains\b.*?</domains>", DOMAINS_ELEMENT)?;

    let options_re = Regex::new(r"<options\b([^>]*?)(/?)>")?;
    let xml = match options_re.captures(&xml) {
        Some(caps) if caps[1].contains("rootVolumeOnly") => xml.clone(),
        Some(caps) => {
            let patched = format!(r#"<options{} rootVolumeOnly="true"{}>"#, &caps[1], &caps[2]);
            options_re.replace(&xml, NoExpand(&patched)).into_owned()
        }
        None => insert_after_root(&xml, r#"<options customize="never" rootVolumeOnly="true"/>"#)?,
    };
    Ok(xml)
}

/// Replaces the first match of `pattern`, or inserts `element` after the
/// opening `<installer-gui-script>` tag.
fn replace_or_insert(xml: &str, pattern: &str, element: &str) -> Result<String> {
    let re = Regex::new(pattern)?;
    if re.is_match(xml) {
        Ok(re.replace(xml, NoExpand(element)).into_owned())
    } else {
        insert_after_root(xml, element)
    }
}

fn insert_after_root(xml: &str, element: &str) -> Result<String> {
    let root_re = Regex::new(r"<installer-gui-script\b[^>]*>")?;
    match root_re.find(xml) {
        Some(m) => {
            let mut out = String::with_capacity(xml.len() + element.len() + 8);
            out.push_str(&xml[..m.end()]);
            out.push_str("\n    ");
            out.push_str(element);
            out.push_str(&xml[m.end()..]);
            Ok(out)
        }
        None => Err(Error::GenericError(
            "distribution descriptor has no <installer-gui-script> element".into(),
        )),
    }
}

/// Synthesizes a descriptor for one component, then patches it.
pub async fn synthesize<R: ToolRunner>(
    settings: &Settings,
    runner: &R,
    component: &Path,
    output: &Path,
    name: &str,
    version: &str,
    log: &RunLog,
) -> Result<()> {
    run_checked(
        runner,
        ToolCommand::new(&settings.tools().productbuild)
            .arg("--synthesize")
            .arg("--package")
            .arg(component)
            .arg(output),
        log,
    )
    .await?;

    let xml = tokio::fs::read_to_string(output)
        .await
        .fs_context("reading synthesized distribution", output)?;
    let patched = patch_descriptor(&xml, name, version)?;
    tokio::fs::write(output, patched)
        .await
        .fs_context("writing distribution", output)?;

    log.debug(format_args!("Patched distribution {}", output.display()));
    Ok(())
}

/// Renders and writes the universal descriptor.
pub async fn write_universal(
    output: &Path,
    descriptor: &UniversalDescriptor<'_>,
    log: &RunLog,
) -> Result<()> {
    let xml = render_universal(descriptor)?;
    tokio::fs::write(output, xml)
        .await
        .fs_context("writing distribution", output)?;
    log.debug(format_args!(
        "Rendered universal distribution {}",
        output.display()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYNTHESIZED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<installer-gui-script minSpecVersion="2">
    <pkg-ref id="com.example.myapp"/>
    <options customize="never" require-scripts="false" hostArchitectures="arm64"/>
    <choices-outline>
        <line choice="default">
            <line choice="com.example.myapp"/>
        </line>
    </choices-outline>
    <choice id="default"/>
    <choice id="com.example.myapp" visible="false">
        <pkg-ref id="com.example.myapp"/>
    </choice>
    <pkg-ref id="com.example.myapp" version="2.3.1" onConclusion="none">MyApp-arm64.pkg</pkg-ref>
</installer-gui-script>"#;

    #[test]
    fn test_patch_adds_title_domains_and_root_volume() {
        let xml = patch_descriptor(SYNTHESIZED, "MyApp", "2.3.1").expect("patch");
        assert!(xml.contains("<title>MyApp 2.3.1</title>"));
        assert!(xml.contains(DOMAINS_ELEMENT));
        assert!(xml.contains(
            r#"<options customize="never" require-scripts="false" hostArchitectures="arm64" rootVolumeOnly="true"/>"#
        ));
        assert!(
            xml.find("<title>").expect("title")
                > xml.find("<installer-gui-script").expect("root")
        );
    }

    #[test]
    fn test_patch_is_idempotent() {
        let once = patch_descriptor(SYNTHESIZED, "MyApp", "2.3.1").expect("patch");
        let twice = patch_descriptor(&once, "MyApp", "2.3.1").expect("patch");
        assert_eq!(once, twice);
        assert_eq!(twice.matches("<title>").count(), 1);
        assert_eq!(twice.matches("<domains").count(), 1);
        assert_eq!(twice.matches("rootVolumeOnly").count(), 1);
    }

    #[test]
    fn test_patch_replaces_existing_title_and_domains() {
        let xml = SYNTHESIZED.replacen(
            "<pkg-ref id=\"com.example.myapp\"/>\n",
            "<title>Old</title>\n    <domains enable_anywhere=\"true\"/>\n    <pkg-ref id=\"com.example.myapp\"/>\n",
            1,
        );
        let patched = patch_descriptor(&xml, "MyApp", "2.3.1").expect("patch");
        assert!(!patched.contains("<title>Old</title>"));
        assert!(!patched.contains(r#"enable_anywhere="true""#));
        assert_eq!(patched.matches("<domains").count(), 1);
    }

    #[test]
    fn test_patch_creates_missing_options() {
        let xml = SYNTHESIZED.replace(
            "    <options customize=\"never\" require-scripts=\"false\" hostArchitectures=\"arm64\"/>\n",
            "",
        );
        let patched = patch_descriptor(&xml, "MyApp", "2.3.1").expect("patch");
        assert!(patched.contains(r#"<options customize="never" rootVolumeOnly="true"/>"#));
    }

    #[test]
    fn test_patch_escapes_title() {
        let xml = patch_descriptor(SYNTHESIZED, "Tom & Jerry", "1.0").expect("patch");
        assert!(xml.contains("<title>Tom &amp; Jerry 1.0</title>"));
    }

    #[test]
    fn test_patch_requires_root_element() {
        assert!(patch_descriptor("<not-a-descriptor/>", "MyApp", "1.0").is_err());
    }

    fn universal() -> String {
        render_universal(&UniversalDescriptor {
            name: "App",
            identifier: "com.example.app",
            version: "9.0",
            arm64_package: "App-arm64.pkg",
            x86_64_package: "App-x86_64.pkg",
        })
        .expect("render")
    }

    #[test]
    fn test_universal_has_two_gated_pkg_refs() {
        let xml = universal();
        assert_eq!(xml.matches("<pkg-ref ").count(), 2);
        assert!(xml.contains(r#"id="com.example.app.arm64""#));
        assert!(xml.contains(r#"id="com.example.app.x86_64""#));
        assert_eq!(xml.matches(r#"onConclusion="none""#).count(), 2);
        assert!(xml.contains(r#"hostArchitectures="arm64,x86_64""#));
        assert!(xml.contains(r#"enabled="is_arm()" selected="is_arm()""#));
        assert!(xml.contains(r#"enabled="! is_arm()" selected="! is_arm()""#));
        assert!(xml.contains("function is_arm()"));
        assert!(xml.contains("machdep.cpu.brand_string"));
        assert!(xml.contains("<title>App 9.0</title>"));
        assert!(xml.contains(DOMAINS_ELEMENT));
    }

    #[test]
    fn test_universal_is_already_fully_patched() {
        let xml = universal();
        assert_eq!(
            patch_descriptor(&xml, "App", "9.0").expect("patch"),
            xml
        );
    }
}
