use crate::process::LaunchPlan;
use chrono::Utc;
use std::future::Future;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{sleep, timeout_at, Instant};
use toolrun_core::{
    ExitOutcome, ProcessInvocation, ProcessResult, RunnerConfig, SpawnError, LINE_SEPARATOR,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs external processes with full output capture and a bounded lifetime
#[derive(Clone, Default)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

/// Stdout lines collected for one invocation
#[derive(Debug, Default)]
pub struct OutputAccumulator {
    text: String,
    lines: usize,
}

impl OutputAccumulator {
    pub fn push_line(&mut self, line: &str) {
        if self.lines > 0 {
            self.text.push_str(LINE_SEPARATOR);
        }
        self.text.push_str(line);
        self.lines += 1;
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run one invocation to completion.
    ///
    /// Only failures to start the process are errors. A non-zero exit or a
    /// timeout kill is reported through the returned `ProcessResult`.
    pub async fn execute(&self, invocation: &ProcessInvocation) -> Result<ProcessResult, SpawnError> {
        let plan = LaunchPlan::prepare(invocation, &self.config)?;

        let started_at = Utc::now();
        let start_instant = std::time::Instant::now();

        info!(
            invocation_id = %invocation.id,
            command = %invocation.display_command(),
            timeout = ?plan.timeout,
            "Starting process"
        );

        let mut child = plan
            .command()
            .spawn()
            .map_err(|e| SpawnError::from_io(&invocation.executable, e))?;

        // Stdout is drained concurrently so the direct stderr read below cannot
        // deadlock against a child blocked on a full stdout pipe. Lines travel over
        // a channel so whatever was read survives a reader that has to be aborted.
        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let stdout_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(forward_lines(stdout, line_tx, invocation.id)));

        let deadline = plan.timeout.and_then(|t| Instant::now().checked_add(t));
        let mut stderr = child.stderr.take();
        let mut stderr_bytes = Vec::new();
        let mut stderr_complete = stderr.is_none();
        let mut timed_out = false;
        let mut early_exit = None;

        // The stderr read ends when the pipe closes or the child exits, whichever
        // comes first; a grandchild may keep the pipe open past the child's exit.
        if let Some(pipe) = stderr.as_mut() {
            tokio::select! {
                read = until(deadline, pipe.read_to_end(&mut stderr_bytes)) => match read {
                    Some(Ok(_)) => stderr_complete = true,
                    Some(Err(e)) => {
                        debug!(invocation_id = %invocation.id, error = %e, "Stderr read failed");
                        stderr_complete = true;
                    }
                    None => timed_out = true,
                },
                status = child.wait() => early_exit = Some(status),
            }
        }

        let waited = match early_exit {
            Some(status) => Some(status),
            None if timed_out => None,
            None => until(deadline, child.wait()).await,
        };
        let natural_exit = match waited {
            Some(Ok(status)) => Some(status),
            Some(Err(e)) => {
                warn!(invocation_id = %invocation.id, error = %e, "Waiting for process failed");
                None
            }
            None => None,
        };

        let (outcome, status) = match natural_exit {
            Some(status) => (ExitOutcome::Exited, Some(status)),
            None => self.terminate(&mut child, invocation.id, plan.timeout).await,
        };
        let exit_code = status.and_then(exit_code_of);
        drop(child);

        // Both streams share one grace period once the process is gone.
        let drain_deadline = Instant::now() + self.config.drain_timeout();

        if !stderr_complete {
            if let Some(pipe) = stderr.as_mut() {
                if timeout_at(drain_deadline, pipe.read_to_end(&mut stderr_bytes))
                    .await
                    .is_err()
                {
                    debug!(invocation_id = %invocation.id, "Stderr still open after exit; keeping partial output");
                }
            }
        }
        drop(stderr);

        let mut accumulator = OutputAccumulator::default();
        loop {
            match timeout_at(drain_deadline, line_rx.recv()).await {
                Ok(Some(line)) => accumulator.push_line(&line),
                Ok(None) => break,
                Err(_) => {
                    warn!(invocation_id = %invocation.id, "Stdout still open after exit; keeping partial output");
                    if let Some(task) = &stdout_task {
                        task.abort();
                    }
                    while let Ok(line) = line_rx.try_recv() {
                        accumulator.push_line(&line);
                    }
                    break;
                }
            }
        }
        let standard_output = accumulator.into_string();

        let duration_ms = start_instant.elapsed().as_millis() as u64;
        let completed_at = Utc::now();

        info!(
            invocation_id = %invocation.id,
            outcome = ?outcome,
            exit_code = ?exit_code,
            duration_ms,
            "Process finished"
        );

        Ok(ProcessResult {
            invocation_id: invocation.id,
            outcome,
            exit_code,
            standard_output,
            standard_error: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            duration_ms,
            started_at,
            completed_at,
        })
    }

    /// Run invocations concurrently, at most `max_parallel` at a time.
    /// Results come back in input order.
    pub async fn execute_all(
        &self,
        invocations: Vec<ProcessInvocation>,
    ) -> Vec<Result<ProcessResult, SpawnError>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut handles = Vec::with_capacity(invocations.len());

        for invocation in invocations {
            let runner = self.clone();
            let semaphore = semaphore.clone();
            let executable = invocation.executable.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                runner.execute(&invocation).await
            });
            handles.push((executable, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (executable, handle) in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(SpawnError::Io {
                    executable,
                    source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                }),
            });
        }
        results
    }

    /// Kill the child and poll until exit is confirmed or the termination deadline passes.
    async fn terminate(
        &self,
        child: &mut Child,
        invocation_id: Uuid,
        timeout: Option<Duration>,
    ) -> (ExitOutcome, Option<ExitStatus>) {
        // It may have exited on its own between the wait giving up and now.
        if let Ok(Some(status)) = child.try_wait() {
            return (ExitOutcome::Exited, Some(status));
        }

        warn!(
            invocation_id = %invocation_id,
            timeout = ?timeout,
            "Process did not exit in time; killing"
        );
        if let Err(e) = child.start_kill() {
            warn!(invocation_id = %invocation_id, error = %e, "Kill request failed");
        }

        let give_up = Instant::now() + self.config.termination_deadline();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return (ExitOutcome::Killed, Some(status)),
                Ok(None) => {}
                Err(e) => {
                    warn!(invocation_id = %invocation_id, error = %e, "Polling killed process failed");
                }
            }
            if Instant::now() >= give_up {
                warn!(
                    invocation_id = %invocation_id,
                    deadline = ?self.config.termination_deadline(),
                    "Process still running after kill"
                );
                return (ExitOutcome::TerminationFailed, None);
            }
            sleep(self.config.poll_interval()).await;
        }
    }
}

/// Await `fut`, giving up at `deadline` if one is set.
async fn until<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Send stdout lines, terminators stripped, until end of stream.
async fn forward_lines<R: AsyncRead + Unpin>(
    reader: R,
    lines: mpsc::UnboundedSender<String>,
    invocation_id: Uuid,
) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if line.ends_with(b"\n") {
                    line.pop();
                }
                if line.ends_with(b"\r") {
                    line.pop();
                }
                if lines.send(String::from_utf8_lossy(&line).into_owned()).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(invocation_id = %invocation_id, error = %e, "Stdout read failed");
                break;
            }
        }
    }
}

/// Exit code as reported by the OS. Signal deaths map to `128 + signal` on Unix.
pub fn exit_code_of(status: ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|sig| 128 + sig))
    }
    #[cfg(not(unix))]
    {
        status.code()
    }
}
