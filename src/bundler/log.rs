//! Per-run logging handle.
//!
//! Every run gets its own [`RunLog`] carrying a short run id. Messages go to
//! the `log` facade (so `env_logger` in the binary picks them up) and, when
//! the handle was created with [`RunLog::capturing`], into an in-memory
//! transcript that tests can inspect without installing a global logger.

use log::Level;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

const TARGET: &str = "kodegen_bundler_pkg::run";

/// Logging capability passed into the pipeline.
#[derive(Clone, Debug)]
pub struct RunLog {
    run_id: Arc<str>,
    transcript: Option<Arc<Mutex<Vec<String>>>>,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLog {
    /// Handle that only forwards to the `log` facade.
    pub fn new() -> Self {
        Self {
            run_id: new_run_id(),
            transcript: None,
        }
    }

    /// Handle that also records every line in memory.
    pub fn capturing() -> Self {
        Self {
            run_id: new_run_id(),
            transcript: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Derives the handle for a new run: fresh id, shared transcript.
    pub fn for_run(&self) -> Self {
        Self {
            run_id: new_run_id(),
            transcript: self.transcript.clone(),
        }
    }

    /// Short id prefixed to every line of this run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Snapshot of captured lines (empty when not capturing).
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .as_ref()
            .and_then(|t| t.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    /// Log at debug level.
    pub fn debug(&self, message: impl Display) {
        self.emit(Level::Debug, message);
    }

    /// Log at info level.
    pub fn info(&self, message: impl Display) {
        self.emit(Level::Info, message);
    }

    /// Log at warn level.
    pub fn warn(&self, message: impl Display) {
        self.emit(Level::Warn, message);
    }

    /// Log at error level.
    pub fn error(&self, message: impl Display) {
        self.emit(Level::Error, message);
    }

    fn emit(&self, level: Level, message: impl Display) {
        let line = format!("[{}] {}", self.run_id, message);
        log::log!(target: TARGET, level, "{}", line);

        if let Some(transcript) = &self.transcript
            && let Ok(mut lines) = transcript.lock()
        {
            lines.push(format!("{level} {line}"));
        }
    }
}

fn new_run_id() -> Arc<str> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    Arc::from(&id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capturing_records_level_and_run_id() {
        let log = RunLog::capturing();
        log.info("mounted volume");
        log.warn("detach failed");

        let lines = log.transcript();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("INFO ["));
        assert!(lines[0].contains(log.run_id()));
        assert!(lines[1].ends_with("detach failed"));
    }

    #[test]
    fn test_for_run_shares_transcript_with_new_id() {
        let base = RunLog::capturing();
        let run = base.for_run();
        assert_ne!(base.run_id(), run.run_id());

        run.debug("staging root");
        assert_eq!(base.transcript().len(), 1);
    }

    #[test]
    fn test_non_capturing_has_empty_transcript() {
        let log = RunLog::new();
        log.info("ignored");
        assert!(log.transcript().is_empty());
    }
}
