//! External tool execution.
//!
//! Every macOS tool the pipeline drives (`hdiutil`, `ditto`, `tar`, `file`,
//! `pkgbuild`, `productbuild`, `spctl`, `pkgutil`) goes through a
//! [`ToolRunner`]. The production runner spawns the process with
//! `tokio::process`, so a run awaiting a slow mount only suspends its own
//! task. There are no retries and no timeouts.

use crate::bundler::error::{Error, Result};
use crate::bundler::log::RunLog;
use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::path::Path;

/// A program plus its arguments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ToolCommand {
    /// Command for `program` with no arguments yet.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Program as given (name or absolute path).
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// File name of the program, e.g. `hdiutil` for `/usr/bin/hdiutil`.
    pub fn program_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .unwrap_or(&self.program)
            .to_string_lossy()
            .into_owned()
    }

    /// Arguments in order.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments as lossy UTF-8 strings.
    pub fn arguments_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(&arg);
                line.push('"');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

/// Captured result of a finished tool.
#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output carrying `stdout`.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and `stderr`.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Exit code 0.
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Executes external tools.
///
/// Implementations must return `Ok` for any process that ran, whatever its
/// exit code; only a failure to start the process is an `Err`.
pub trait ToolRunner: Send + Sync {
    /// Runs `command` to completion and captures its output.
    fn run(&self, command: &ToolCommand) -> impl Future<Output = Result<ToolOutput>> + Send;
}

/// Runner backed by `tokio::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let output = tokio::process::Command::new(command.program())
            .args(command.arguments())
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|error| Error::CommandFailed {
                command: command.display(),
                error,
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs `command`, logs its output, and fails on a non-zero exit.
pub(crate) async fn run_checked<R: ToolRunner>(
    runner: &R,
    command: ToolCommand,
    log: &RunLog,
) -> Result<ToolOutput> {
    let output = run_logged(runner, command.clone(), log).await?;
    if output.is_success() {
        Ok(output)
    } else {
        Err(Error::ToolFailed {
            command: command.display(),
            code: output.code,
            output: output.combined(),
        })
    }
}

/// Runs `command` and logs its output; the exit code is left to the caller.
pub(crate) async fn run_logged<R: ToolRunner>(
    runner: &R,
    command: ToolCommand,
    log: &RunLog,
) -> Result<ToolOutput> {
    log.debug(format_args!("$ {}", command.display()));
    let output = runner.run(&command).await?;
    let text = output.combined();

    if output.is_success() {
        if !text.is_empty() {
            log.debug(format_args!("{}: {}", command.program_name(), text));
        }
    } else {
        log.warn(format_args!(
            "{} exited with {:?}: {}",
            command.program_name(),
            output.code,
            text
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let cmd = ToolCommand::new("/usr/bin/ditto")
            .args(["-x", "-k"])
            .arg("/tmp/My App.zip");
        assert_eq!(cmd.display(), "/usr/bin/ditto -x -k \"/tmp/My App.zip\"");
        assert_eq!(cmd.program_name(), "ditto");
    }

    #[test]
    fn test_combined_merges_streams() {
        let output = ToolOutput {
            code: Some(1),
            stdout: "partial\n".into(),
            stderr: "error: busy\n".into(),
        };
        assert_eq!(output.combined(), "partial\nerror: busy");
        assert!(!output.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output_and_status() {
        let runner = SystemRunner;
        let ok = runner
            .run(&ToolCommand::new("sh").args(["-c", "echo out; echo err >&2"]))
            .await
            .expect("sh should run");
        assert!(ok.is_success());
        assert_eq!(ok.stdout.trim(), "out");
        assert_eq!(ok.stderr.trim(), "err");

        let failed = runner
            .run(&ToolCommand::new("sh").args(["-c", "exit 3"]))
            .await
            .expect("sh should run");
        assert_eq!(failed.code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_checked_reports_tool_failure() {
        let log = RunLog::capturing();
        let err = run_checked(
            &SystemRunner,
            ToolCommand::new("sh").args(["-c", "echo nope >&2; exit 2"]),
            &log,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ToolFailed { code: Some(2), ref output, .. } if output == "nope"));
        assert!(log.transcript().iter().any(|l| l.starts_with("WARN")));
    }

    #[tokio::test]
    async fn test_missing_program_is_command_failed() {
        let err = SystemRunner
            .run(&ToolCommand::new("/nonexistent/kodegen-no-such-tool"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }
}
