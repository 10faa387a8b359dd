//! Colored terminal output.
//!
//! Human-readable messages go to stdout (errors to stderr) unless `--json`
//! is set, in which case stdout carries exactly one JSON document.

use crate::bundler::{BuiltPackage, PackageContents, SignatureAssessment};
use serde::Serialize;
use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    stdout: BufferWriter,
    verbose: bool,
    quiet: bool,
    json: bool,
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool, json: bool) -> Self {
        Self {
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
            json,
        }
    }

    fn human(&self) -> bool {
        !self.quiet && !self.json
    }

    fn line(&self, marker: &str, color: Color, bold: bool, message: &str) {
        if !self.human() {
            return;
        }
        let mut buffer = self.stdout.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
        let _ = write!(&mut buffer, "{marker}");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {message}");
        let _ = self.stdout.print(&buffer);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        self.line("ℹ", Color::Cyan, false, message);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.line("✓", Color::Green, true, message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        self.line("⚠", Color::Yellow, true, message);
    }

    /// Print a verbose message (only with --verbose)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.line("→", Color::Blue, false, message);
        }
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) {
        if !self.human() {
            return;
        }
        let mut buffer = self.stdout.buffer();
        let _ = writeln!(&mut buffer, "    {message}");
        let _ = self.stdout.print(&buffer);
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        let stderr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = stderr.buffer();
        let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = write!(&mut buffer, "✗");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, " {message}");
        if stderr.print(&buffer).is_err() {
            eprintln!("✗ {message}");
        }
    }

    /// Print recovery suggestions to stderr
    pub fn suggestions(&self, suggestions: &[String]) {
        if suggestions.is_empty() {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "\n💡 Recovery suggestions:");
        for suggestion in suggestions {
            let _ = writeln!(stderr, "  • {suggestion}");
        }
    }

    /// Print `value` as pretty JSON when `--json` is set
    pub fn json<T: Serialize>(&self, value: &T) -> serde_json::Result<()> {
        if self.json {
            let text = serde_json::to_string_pretty(value)?;
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{text}");
        }
        Ok(())
    }

    /// Summary of a finished package
    pub fn package(&self, package: &BuiltPackage) {
        self.success(&format!("Created {}", package.path.display()));
        self.indent(&format!(
            "{} {} ({}, {})",
            package.name, package.version, package.identifier, package.architecture
        ));
        for component in &package.components {
            self.indent(&format!("component {component}"));
        }
        self.indent(&format!("{} bytes", package.size));
        self.indent(&format!("SHA256 {}", package.checksum));
    }

    /// Summary of an inspected package
    pub fn inspection(&self, assessment: &SignatureAssessment, contents: &PackageContents) {
        if assessment.accepted {
            self.success("Gatekeeper: accepted");
        } else {
            self.warn("Gatekeeper: rejected");
        }
        if let Some(source) = &assessment.source {
            self.indent(&format!("source: {source}"));
        }
        if let Some(origin) = &assessment.origin {
            self.indent(&format!("origin: {origin}"));
        }
        self.info(&format!("{} component(s)", contents.refs.len()));
        for package_ref in &contents.refs {
            self.indent(&format!("{} {}", package_ref.identifier, package_ref.version));
        }
    }

    /// Check if JSON output is enabled
    pub fn is_json(&self) -> bool {
        self.json
    }
}
