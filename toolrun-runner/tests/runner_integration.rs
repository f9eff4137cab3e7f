use std::time::{Duration, Instant};
use toolrun_core::{ExitOutcome, ProcessInvocation, RunnerConfig, SpawnError, LINE_SEPARATOR};
use toolrun_runner::ProcessRunner;

const DOUBLE: &str = env!("CARGO_BIN_EXE_toolrun-double");

fn double(arguments: &str) -> ProcessInvocation {
    ProcessInvocation::new(DOUBLE, arguments).with_timeout(Duration::from_secs(30))
}

#[tokio::test]
async fn test_echo_tool_scenario() {
    let runner = ProcessRunner::new();
    let invocation = ProcessInvocation::new(DOUBLE, "echo hello world")
        .with_timeout(Duration::from_secs(5));

    let result = runner.execute(&invocation).await.unwrap();

    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.outcome, ExitOutcome::Exited);
    assert_eq!(result.standard_output, "hello world");
    assert_eq!(result.standard_error, "");
    assert_eq!(result.invocation_id, invocation.id);
    assert!(result.success());
}

#[tokio::test]
async fn test_stdout_lines_in_order() {
    let runner = ProcessRunner::new();
    let result = runner.execute(&double("lines 250")).await.unwrap();

    let expected: Vec<String> = (1..=250).map(|i| format!("line {}", i)).collect();
    assert_eq!(result.standard_output, expected.join(LINE_SEPARATOR));
}

#[tokio::test]
async fn test_quoted_arguments_pass_through() {
    let runner = ProcessRunner::new();
    let result = runner
        .execute(&double(r#"echo "two  spaces" plain"#))
        .await
        .unwrap();

    assert_eq!(result.standard_output, "two  spaces plain");
}

#[tokio::test]
async fn test_non_zero_exit_is_a_result() {
    let runner = ProcessRunner::new();
    let result = runner.execute(&double("exit 7")).await.unwrap();

    assert_eq!(result.outcome, ExitOutcome::Exited);
    assert_eq!(result.exit_code, Some(7));
    assert!(result.standard_error.contains("exiting with 7"));
    assert!(!result.success());
    assert!(!result.was_killed());
}

#[tokio::test]
async fn test_stderr_captured_on_success() {
    let runner = ProcessRunner::new();
    let result = runner.execute(&double("warn deprecated flag")).await.unwrap();

    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.standard_error, "deprecated flag");
}

#[tokio::test]
async fn test_large_output_on_both_streams_does_not_deadlock() {
    let runner = ProcessRunner::new();
    let invocation = double("flood 20000").with_timeout(Duration::from_secs(120));

    let result = runner.execute(&invocation).await.unwrap();

    assert_eq!(result.outcome, ExitOutcome::Exited);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.standard_output.lines().count(), 20000);
    assert!(result.standard_output.starts_with("out 0 "));
    assert!(result.standard_error.len() > 1024 * 1024);
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let runner = ProcessRunner::new();
    let invocation = ProcessInvocation::new(DOUBLE, "sleep 60").with_timeout(Duration::from_secs(1));

    let started = Instant::now();
    let result = runner.execute(&invocation).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
    assert_eq!(result.outcome, ExitOutcome::Killed);
    assert!(result.exit_code.is_some());
    assert!(result.was_killed());
    assert!(!result.success());
}

#[tokio::test]
async fn test_config_default_timeout_applies() {
    let runner = ProcessRunner::with_config(RunnerConfig {
        default_timeout_secs: 1,
        ..Default::default()
    });
    let invocation = ProcessInvocation::new(DOUBLE, "sleep 60");

    let result = runner.execute(&invocation).await.unwrap();

    assert_eq!(result.outcome, ExitOutcome::Killed);
}

#[tokio::test]
async fn test_environment_override_wins_over_inherited() {
    std::env::set_var("TOOLRUN_IT_SHADOWED", "inherited");
    let runner = ProcessRunner::new();

    let shadowed = double("env TOOLRUN_IT_SHADOWED").with_env("TOOLRUN_IT_SHADOWED", "override");
    let result = runner.execute(&shadowed).await.unwrap();
    assert_eq!(result.standard_output, "override");

    let inherited = double("env TOOLRUN_IT_SHADOWED");
    let result = runner.execute(&inherited).await.unwrap();
    assert_eq!(result.standard_output, "inherited");
}

#[tokio::test]
async fn test_working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ProcessRunner::new();

    let result = runner
        .execute(&double("pwd").with_working_directory(dir.path()))
        .await
        .unwrap();

    let reported = std::fs::canonicalize(result.standard_output.trim()).unwrap();
    assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
}

#[tokio::test]
async fn test_missing_executable_is_spawn_error() {
    let runner = ProcessRunner::new();
    let invocation = ProcessInvocation::new("toolrun-it-no-such-tool", "--version");

    let err = runner.execute(&invocation).await.unwrap_err();
    assert!(matches!(err, SpawnError::NotFound(ref name) if name == "toolrun-it-no-such-tool"));
}

#[tokio::test]
async fn test_missing_working_directory_is_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone");
    let runner = ProcessRunner::new();

    let err = runner
        .execute(&double("pwd").with_working_directory(&missing))
        .await
        .unwrap_err();
    assert!(matches!(err, SpawnError::WorkingDirectory(path) if path == missing));
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_executable_file_is_permission_denied() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("not-executable.sh");
    std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();

    let runner = ProcessRunner::new();
    let err = runner
        .execute(&ProcessInvocation::new(script.to_string_lossy(), ""))
        .await
        .unwrap_err();
    assert!(matches!(err, SpawnError::PermissionDenied { .. }));
}

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let runner = ProcessRunner::with_config(RunnerConfig {
        max_parallel: 3,
        ..Default::default()
    });
    let invocations: Vec<ProcessInvocation> =
        (0..8).map(|i| double(&format!("echo job-{}", i))).collect();

    let results = runner.execute_all(invocations).await;

    assert_eq!(results.len(), 8);
    for (i, result) in results.iter().enumerate() {
        let result = result.as_ref().unwrap();
        assert_eq!(result.standard_output, format!("job-{}", i));
        assert_eq!(result.exit_code, Some(0));
    }
}

#[tokio::test]
async fn test_batch_keeps_spawn_errors_in_place() {
    let runner = ProcessRunner::new();
    let invocations = vec![
        double("echo first"),
        ProcessInvocation::new("toolrun-it-missing-in-batch", ""),
        double("exit 2"),
    ];

    let results = runner.execute_all(invocations).await;

    assert_eq!(results[0].as_ref().unwrap().standard_output, "first");
    assert!(matches!(results[1], Err(SpawnError::NotFound(_))));
    assert_eq!(results[2].as_ref().unwrap().exit_code, Some(2));
}

#[tokio::test]
async fn test_parallel_execute_calls_do_not_share_output() {
    let runner = ProcessRunner::new();
    let a = double("lines 500");
    let b = double("echo solo");

    let (ra, rb) = tokio::join!(runner.execute(&a), runner.execute(&b));

    assert_eq!(ra.unwrap().standard_output.lines().count(), 500);
    assert_eq!(rb.unwrap().standard_output, "solo");
}
