//! Out-of-process execution of nixpkgs packages through the external runner.
//!
//! The invocation is always a literal argument vector — never a shell string —
//! so caller-supplied arguments cannot be reinterpreted by a shell.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Wall-clock limit for one execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_RUNNER: &str = "nix";
const RUNNER_ENV: &str = "NIXPKGS_MCP_RUNNER";
const TIMEOUT_ENV: &str = "NIXPKGS_MCP_EXEC_TIMEOUT_MS";

pub type Result<T> = std::result::Result<T, ExecError>;

/// The process could not be run at all. A process that ran and failed is not
/// an error; it is an [`ExecutionResult`] with a non-zero exit code.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to launch '{runner}': {source}")]
    Spawn {
        runner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect output: {0}")]
    Wait(#[source] std::io::Error),
}

/// How one execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Process completed within the timeout; exit code verbatim
    /// (-1 when terminated by a signal).
    Exited(i32),
    /// Process exceeded the wall-clock limit and was killed.
    TimedOut,
}

/// Captured result of exactly one runner invocation.
#[derive(Debug)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecStatus,
}

/// Runs `<runner> run nixpkgs#<package> -- <args…>` with bounded wall-clock
/// time and captured output.
#[derive(Debug, Clone)]
pub struct Executor {
    runner: String,
    timeout: Duration,
}

impl Executor {
    pub fn new(runner: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner: runner.into(),
            timeout,
        }
    }

    /// Defaults (`nix`, 30s) with `NIXPKGS_MCP_RUNNER` /
    /// `NIXPKGS_MCP_EXEC_TIMEOUT_MS` overrides.
    pub fn from_env() -> Self {
        let runner = std::env::var(RUNNER_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_RUNNER.to_string());

        let timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        Self::new(runner, timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one package invocation. Arguments are appended verbatim after the
    /// `--` separator. `stdin` is piped to the child when present. On timeout
    /// the child is killed and a `TimedOut` result is returned; only a launch
    /// failure is an `Err`.
    pub async fn run(
        &self,
        package: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<ExecutionResult> {
        let mut command = Command::new(&self.runner);
        command
            .arg("run")
            .arg(format!("nixpkgs#{package}"))
            .arg("--")
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must not leak the child.
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            runner: self.runner.clone(),
            source,
        })?;

        // The stdin write runs concurrently with the output wait, inside the
        // same deadline: a child that never drains stdin must still hit the
        // wall-clock limit, not block the write forever once the pipe fills.
        let stdin_handle = child.stdin.take();
        let io = async {
            match (stdin_handle, stdin) {
                (Some(mut handle), Some(input)) => {
                    let write = async {
                        // The child may exit without draining stdin; that is
                        // its business, not a dispatch failure.
                        if let Err(err) = handle.write_all(input.as_bytes()).await {
                            log::debug!("stdin write to '{}' failed: {err}", self.runner);
                        }
                        // Dropping the handle closes the pipe so the child
                        // sees EOF.
                        drop(handle);
                    };
                    let (_, output) = tokio::join!(write, child.wait_with_output());
                    output
                }
                _ => child.wait_with_output().await,
            }
        };

        match tokio::time::timeout(self.timeout, io).await {
            Ok(output) => {
                let output = output.map_err(ExecError::Wait)?;
                Ok(ExecutionResult {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    status: ExecStatus::Exited(output.status.code().unwrap_or(-1)),
                })
            }
            Err(_) => Ok(ExecutionResult {
                stdout: String::new(),
                stderr: String::new(),
                status: ExecStatus::TimedOut,
            }),
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn write_runner(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-runner");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write runner");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod runner");
        path
    }

    #[tokio::test]
    async fn captures_streams_and_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = write_runner(dir.path(), "echo \"target=$2\"\necho oops >&2\nexit 3");

        let executor = Executor::new(runner.to_string_lossy(), DEFAULT_TIMEOUT);
        let result = executor
            .run("jq", &["--version".to_string()], None)
            .await
            .expect("run");

        assert_eq!(result.status, ExecStatus::Exited(3));
        assert_eq!(result.stdout, "target=nixpkgs#jq\n");
        assert_eq!(result.stderr, "oops\n");
    }

    #[tokio::test]
    async fn passes_arguments_after_separator() {
        let dir = tempfile::tempdir().expect("tempdir");
        // $1=run $2=nixpkgs#pkg $3=-- then caller args
        let runner = write_runner(dir.path(), "shift 3\necho \"$@\"");

        let executor = Executor::new(runner.to_string_lossy(), DEFAULT_TIMEOUT);
        let result = executor
            .run(
                "jq",
                &["-r".to_string(), ".name".to_string()],
                None,
            )
            .await
            .expect("run");

        assert_eq!(result.status, ExecStatus::Exited(0));
        assert_eq!(result.stdout, "-r .name\n");
    }

    #[tokio::test]
    async fn pipes_stdin_to_the_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = write_runner(dir.path(), "cat");

        let executor = Executor::new(runner.to_string_lossy(), DEFAULT_TIMEOUT);
        let result = executor
            .run("cat", &[], Some("piped input"))
            .await
            .expect("run");

        assert_eq!(result.status, ExecStatus::Exited(0));
        assert_eq!(result.stdout, "piped input");
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = write_runner(dir.path(), "sleep 30");

        let executor = Executor::new(runner.to_string_lossy(), Duration::from_millis(100));
        let start = std::time::Instant::now();
        let result = executor.run("sleep", &[], None).await.expect("run");

        assert_eq!(result.status, ExecStatus::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn timeout_applies_while_stdin_is_being_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Never reads stdin, so a write larger than the pipe buffer blocks.
        let runner = write_runner(dir.path(), "sleep 30");

        let executor = Executor::new(runner.to_string_lossy(), Duration::from_millis(100));
        let input = "x".repeat(1 << 20);
        let start = std::time::Instant::now();
        let result = executor
            .run("sleep", &[], Some(&input))
            .await
            .expect("run");

        assert_eq!(result.status, ExecStatus::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_runner_is_a_launch_error() {
        let executor = Executor::new("/nonexistent/runner", DEFAULT_TIMEOUT);
        let err = executor.run("jq", &[], None).await.expect_err("spawn fails");
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
