// Launch parameters for a single invocation

use crate::environment::{self, CASE_INSENSITIVE_NAMES};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use toolrun_core::{ProcessInvocation, RunnerConfig, SpawnError};
use tracing::debug;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Fully resolved launch parameters for one invocation
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub program: PathBuf,
    /// Raw argument string, handed to the OS untouched on Windows.
    #[cfg(windows)]
    pub arguments: String,
    #[cfg(not(windows))]
    pub arguments: Vec<String>,
    pub working_directory: PathBuf,
    pub environment: Vec<(OsString, OsString)>,
    pub timeout: Option<Duration>,
}

impl LaunchPlan {
    /// Validate and resolve everything needed before spawn.
    pub fn prepare(
        invocation: &ProcessInvocation,
        config: &RunnerConfig,
    ) -> Result<Self, SpawnError> {
        let working_directory = match &invocation.working_directory {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(SpawnError::WorkingDirectory(dir.clone()));
                }
                dir.clone()
            }
            None => std::env::current_dir()
                .map_err(|e| SpawnError::from_io(&invocation.executable, e))?,
        };

        let environment = environment::merge_environment(
            std::env::vars_os(),
            &invocation.environment_overrides,
            CASE_INSENSITIVE_NAMES,
        );

        #[cfg(windows)]
        let arguments = {
            // Reject what the splitter would reject, even though the string is passed raw.
            crate::args::split_arguments(&invocation.arguments)?;
            invocation.arguments.clone()
        };
        #[cfg(not(windows))]
        let arguments = crate::args::split_arguments(&invocation.arguments)?;

        let path_var = environment::lookup(&environment, "PATH", CASE_INSENSITIVE_NAMES);
        let program = resolve_executable(&invocation.executable, path_var, &working_directory)?;

        debug!(
            invocation_id = %invocation.id,
            program = %program.display(),
            arguments = ?arguments,
            working_directory = %working_directory.display(),
            "Prepared launch plan"
        );

        Ok(Self {
            program,
            arguments,
            working_directory,
            environment,
            timeout: invocation.timeout.or_else(|| config.default_timeout()),
        })
    }

    /// Build the OS command: direct exec, no window, null stdin, both outputs piped.
    pub fn command(&self) -> Command {
        let mut cmd = std::process::Command::new(&self.program);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
            if !self.arguments.trim().is_empty() {
                cmd.raw_arg(&self.arguments);
            }
        }
        #[cfg(not(windows))]
        cmd.args(&self.arguments);

        cmd.current_dir(&self.working_directory)
            .env_clear()
            .envs(self.environment.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut cmd = Command::from(cmd);
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Resolve an executable name to a path.
///
/// Names containing a path separator are taken relative to `working_directory`.
/// Bare names are searched on `path_var`.
pub fn resolve_executable(
    executable: &str,
    path_var: Option<&std::ffi::OsStr>,
    working_directory: &Path,
) -> Result<PathBuf, SpawnError> {
    if executable.trim().is_empty() {
        return Err(SpawnError::NotFound(executable.to_string()));
    }

    let has_separator =
        executable.contains('/') || executable.contains(std::path::MAIN_SEPARATOR);

    if has_separator {
        let candidate = working_directory.join(executable);
        // Existence only; spawn reports a permission problem precisely.
        return if candidate.exists() {
            Ok(candidate)
        } else {
            Err(SpawnError::NotFound(executable.to_string()))
        };
    }

    which::which_in(executable, path_var, working_directory)
        .map_err(|_| SpawnError::NotFound(executable.to_string()))
}
