use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use toolrun_core::{load_batch, ExitOutcome, ProcessInvocation, ProcessResult, RunnerConfig};
use toolrun_runner::ProcessRunner;

/// Exit status when the child was killed after its timeout
const EXIT_KILLED: i32 = 124;
/// Exit status when the child could not be confirmed dead
const EXIT_TERMINATION_FAILED: i32 = 125;
/// Exit status when the child could not be started
const EXIT_SPAWN_FAILED: i32 = 127;

#[derive(Parser)]
#[command(name = "toolrun")]
#[command(about = "Run external tools with captured output and a bounded lifetime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Runner configuration file (TOML)
    #[arg(long, global = true, env = "TOOLRUN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single executable
    Run {
        /// Executable name or path
        executable: String,

        /// Argument string, passed through as one command line
        #[arg(default_value = "", allow_hyphen_values = true)]
        arguments: String,

        /// Working directory for the process
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Environment override, NAME=VALUE (repeatable)
        #[arg(short, long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Timeout in seconds (0 waits forever; default comes from the config)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every invocation listed in a batch file
    Batch {
        /// Path to the batch file
        file: PathBuf,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective runner configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            executable,
            arguments,
            cwd,
            env,
            timeout,
            json,
        } => {
            let mut invocation = ProcessInvocation::new(executable, arguments);
            invocation.working_directory = cwd;
            invocation.environment_overrides.extend(env);
            match timeout {
                // Unbounded is a runner policy, not a per-invocation duration.
                Some(0) => config.default_timeout_secs = 0,
                Some(secs) => invocation.timeout = Some(Duration::from_secs(secs)),
                None => {}
            }

            let code = run_single(&ProcessRunner::with_config(config), &invocation, json).await?;
            process::exit(code);
        }
        Commands::Batch { file, json } => {
            let code = run_batch(&ProcessRunner::with_config(config), &file, json).await?;
            process::exit(code);
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RunnerConfig> {
    match path {
        Some(path) => RunnerConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e)),
        None => Ok(RunnerConfig::default()),
    }
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got `{}`", s)),
    }
}

async fn run_single(
    runner: &ProcessRunner,
    invocation: &ProcessInvocation,
    json: bool,
) -> anyhow::Result<i32> {
    let result = match runner.execute(invocation).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("toolrun: {}", e);
            return Ok(EXIT_SPAWN_FAILED);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if !result.standard_output.is_empty() {
            println!("{}", result.standard_output);
        }
        if !result.standard_error.is_empty() {
            eprint!("{}", result.standard_error);
        }
        if result.was_killed() {
            eprintln!("toolrun: {}", format_outcome(&result));
        }
    }

    Ok(exit_status_for(&result))
}

async fn run_batch(runner: &ProcessRunner, file: &Path, json: bool) -> anyhow::Result<i32> {
    let invocations = load_batch(file)
        .map_err(|e| anyhow::anyhow!("Failed to load batch file {}: {}", file.display(), e))?;
    let commands: Vec<String> = invocations.iter().map(|i| i.display_command()).collect();

    let results = runner.execute_all(invocations).await;
    let all_ok = results
        .iter()
        .all(|r| r.as_ref().map(|res| res.success()).unwrap_or(false));

    if json {
        let entries: Vec<serde_json::Value> = commands
            .iter()
            .zip(&results)
            .map(|(command, result)| match result {
                Ok(res) => serde_json::json!({ "command": command, "result": res }),
                Err(e) => serde_json::json!({ "command": command, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("Ran {} invocation(s):\n", results.len());
        for (idx, (command, result)) in commands.iter().zip(&results).enumerate() {
            match result {
                Ok(res) => println!(
                    "  {}. {} - {} ({}ms)",
                    idx + 1,
                    command,
                    format_outcome(res),
                    res.duration_ms
                ),
                Err(e) => println!("  {}. {} - SPAWN FAILED: {}", idx + 1, command, e),
            }
        }
    }

    Ok(if all_ok { 0 } else { 1 })
}

fn exit_status_for(result: &ProcessResult) -> i32 {
    match result.outcome {
        ExitOutcome::Exited => result.exit_code.unwrap_or(1),
        ExitOutcome::Killed => EXIT_KILLED,
        ExitOutcome::TerminationFailed => EXIT_TERMINATION_FAILED,
    }
}

fn format_outcome(result: &ProcessResult) -> String {
    match (result.outcome, result.exit_code) {
        (ExitOutcome::Exited, Some(0)) => "SUCCESS".to_string(),
        (ExitOutcome::Exited, Some(code)) => format!("FAILED (exit code {})", code),
        (ExitOutcome::Exited, None) => "FAILED".to_string(),
        (ExitOutcome::Killed, _) => "KILLED after timeout".to_string(),
        (ExitOutcome::TerminationFailed, _) => "TERMINATION FAILED".to_string(),
    }
}
