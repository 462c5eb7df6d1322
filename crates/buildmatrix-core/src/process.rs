//! External process execution.
//!
//! Every unit of work in the matrix is "run an external command and
//! interpret its exit code". The [`ProcessRunner`] trait is the seam
//! between the orchestration logic and the operating system; the real
//! [`CommandRunner`] spawns via tokio, and tests substitute the scripted
//! runner from [`crate::fakes`].
//!
//! A non-zero exit is never an error here: callers get the exit code back
//! and decide what it means. Errors are reserved for commands that cannot
//! be started or that exceed their time limit.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{MatrixError, Result};

/// A single external command invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Program to execute (first element of the source's command line).
    pub command: String,

    /// Arguments, in order.
    pub args: Vec<String>,

    /// Complete environment for the child. The parent environment is not
    /// inherited; callers pass a merged snapshot explicitly.
    pub env: BTreeMap<String, String>,

    /// Working directory for the child.
    pub cwd: PathBuf,

    /// Wall-clock bound; the child is killed when it elapses.
    pub timeout: Option<Duration>,
}

impl ProcessRequest {
    /// One-line rendering of the command for logs and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Captured outcome of an external command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout followed by stderr.
    pub combined_output: String,
}

impl ProcessOutput {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Seam for spawning external commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute the request to completion and capture its output.
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput>;
}

/// Real runner backed by `tokio::process`.
#[derive(Debug, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput> {
        let child = Command::new(&request.command)
            .args(&request.args)
            .env_clear()
            .envs(&request.env)
            .current_dir(&request.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MatrixError::Spawn {
                command: request.display(),
                source,
            })?;

        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| MatrixError::Timeout {
                    command: request.display(),
                    limit_secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            combined_output: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &str, args: &[&str]) -> ProcessRequest {
        ProcessRequest {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: EnvironmentForTests::minimal(),
            cwd: PathBuf::from("."),
            timeout: Some(Duration::from_secs(10)),
        }
    }

    struct EnvironmentForTests;

    impl EnvironmentForTests {
        fn minimal() -> BTreeMap<String, String> {
            // /bin/echo etc. need PATH resolution when spawned by name.
            let mut env = BTreeMap::new();
            if let Ok(path) = std::env::var("PATH") {
                env.insert("PATH".to_string(), path);
            }
            env
        }
    }

    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let runner = CommandRunner::new();
        let output = runner.run(&request("echo", &["hello"])).await.unwrap();

        assert!(output.success());
        assert_eq!(output.exit_code, 0);
        assert!(output.combined_output.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_returns_nonzero_exit_without_error() {
        let runner = CommandRunner::new();
        let output = runner.run(&request("false", &[])).await.unwrap();

        assert!(!output.success());
        assert_ne!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_missing_command_is_spawn_error() {
        let runner = CommandRunner::new();
        let err = runner
            .run(&request("/nonexistent-binary-that-does-not-exist", &[]))
            .await
            .unwrap_err();

        assert!(matches!(err, MatrixError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_enforces_timeout() {
        let runner = CommandRunner::new();
        let mut req = request("sleep", &["5"]);
        req.timeout = Some(Duration::from_millis(100));

        let err = runner.run(&req).await.unwrap_err();
        assert!(matches!(err, MatrixError::Timeout { .. }));
    }

    #[test]
    fn test_display_joins_command_and_args() {
        let req = request("make", &["check"]);
        assert_eq!(req.display(), "make check");
        assert_eq!(request("make", &[]).display(), "make");
    }
}
