use crate::error::{Result, ToolrunError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runner-wide policy. Per-invocation settings override `default_timeout_secs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Exit wait applied when an invocation sets no timeout. `0` waits forever.
    pub default_timeout_secs: u64,
    /// Interval between exit checks after a kill request.
    pub poll_interval_ms: u64,
    /// How long to keep confirming a kill before giving up.
    pub termination_deadline_secs: u64,
    /// Grace period for the stdout reader once the process is gone.
    pub drain_timeout_ms: u64,
    /// Upper bound on concurrently running invocations in a batch.
    pub max_parallel: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 600,
            poll_interval_ms: 50,
            termination_deadline_secs: 5,
            drain_timeout_ms: 2000,
            max_parallel: 4,
        }
    }
}

impl RunnerConfig {
    /// Load a config file, filling unspecified keys with defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ToolrunError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunnerConfig =
            toml::from_str(content).map_err(|e| ToolrunError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ToolrunError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ToolrunError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_parallel == 0 {
            return Err(ToolrunError::Config(
                "max_parallel must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `None` means no timeout is applied.
    pub fn default_timeout(&self) -> Option<Duration> {
        match self.default_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn termination_deadline(&self) -> Duration {
        Duration::from_secs(self.termination_deadline_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
