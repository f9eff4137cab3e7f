use crate::error::{Result, ToolrunError};
use crate::models::ProcessInvocation;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchFile {
    #[serde(default)]
    invocation: Vec<BatchEntry>,
}

/// One `[[invocation]]` table of a batch file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchEntry {
    executable: String,
    #[serde(default)]
    arguments: String,
    working_directory: Option<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    timeout_secs: Option<u64>,
}

impl BatchEntry {
    fn into_invocation(self, base_dir: Option<&Path>) -> ProcessInvocation {
        let mut invocation = ProcessInvocation::new(self.executable, self.arguments);
        invocation.environment_overrides = self.env;
        invocation.timeout = self.timeout_secs.map(Duration::from_secs);
        invocation.working_directory = match (self.working_directory, base_dir) {
            (Some(dir), Some(base)) if dir.is_relative() => Some(base.join(dir)),
            (dir, _) => dir,
        };
        invocation
    }
}

/// Parse batch file contents. Relative working directories are joined onto `base_dir`.
pub fn parse_batch(content: &str, base_dir: Option<&Path>) -> Result<Vec<ProcessInvocation>> {
    let file: BatchFile =
        toml::from_str(content).map_err(|e| ToolrunError::BatchFile(e.to_string()))?;

    if let Some(pos) = file.invocation.iter().position(|e| e.executable.trim().is_empty()) {
        return Err(ToolrunError::BatchFile(format!(
            "invocation #{} has an empty executable",
            pos + 1
        )));
    }

    if let Some(pos) = file.invocation.iter().position(|e| e.timeout_secs == Some(0)) {
        return Err(ToolrunError::BatchFile(format!(
            "invocation #{} has timeout_secs = 0; omit it to use the configured default",
            pos + 1
        )));
    }

    Ok(file
        .invocation
        .into_iter()
        .map(|entry| entry.into_invocation(base_dir))
        .collect())
}

/// Read a batch file from disk
pub fn load_batch<P: AsRef<Path>>(path: P) -> Result<Vec<ProcessInvocation>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse_batch(&content, path.parent())
}
