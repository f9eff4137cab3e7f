use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Separator used when joining captured stdout lines.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Everything needed to launch one external process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessInvocation {
    pub id: Uuid,
    pub executable: String,
    /// Whole command line after the executable, not yet split into argv.
    pub arguments: String,
    pub working_directory: Option<PathBuf>,
    pub environment_overrides: BTreeMap<String, String>,
    /// `None` falls back to the runner's configured default.
    pub timeout: Option<Duration>,
}

impl ProcessInvocation {
    pub fn new(executable: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            executable: executable.into(),
            arguments: arguments.into(),
            working_directory: None,
            environment_overrides: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_overrides.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Human-readable form for logs and CLI summaries
    pub fn display_command(&self) -> String {
        if self.arguments.trim().is_empty() {
            self.executable.clone()
        } else {
            format!("{} {}", self.executable, self.arguments)
        }
    }
}

/// How the child process came to an end
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// The process exited on its own.
    Exited,
    /// The timeout elapsed and the process was terminated.
    Killed,
    /// Termination was requested but exit was never confirmed.
    TerminationFailed,
}

/// Result of a completed invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub invocation_id: Uuid,
    pub outcome: ExitOutcome,
    /// Only `None` when the outcome is `TerminationFailed`.
    pub exit_code: Option<i32>,
    pub standard_output: String,
    pub standard_error: String,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.outcome == ExitOutcome::Exited && self.exit_code == Some(0)
    }

    pub fn was_killed(&self) -> bool {
        self.outcome != ExitOutcome::Exited
    }
}
