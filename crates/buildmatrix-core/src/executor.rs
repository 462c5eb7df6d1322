//! Executes one build variant: configure, then build+test.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::env::EnvironmentSnapshot;
use crate::error::MatrixError;
use crate::process::{ProcessRequest, ProcessRunner};
use crate::registry::Configuration;

/// Maximum number of trailing lines kept from a diagnostic source.
const EXCERPT_MAX_LINES: usize = 200;

/// Terminal outcome of one configuration run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// Which phase produced a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Configure,
    BuildTest,
}

/// Result of executing one configuration. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Name of the configuration that ran.
    pub configuration: String,

    /// Terminal outcome.
    pub outcome: Outcome,

    /// Exit code of the failing phase (0 when passed, -1 when the tool
    /// could not be spawned).
    pub exit_code: i32,

    /// Phase that failed, when `outcome` is `Failed`.
    pub failed_phase: Option<Phase>,

    /// Trailing lines of the diagnostic log or captured output, when a
    /// failure left any behind.
    pub log_excerpt: Option<String>,

    /// Wall-clock duration of the whole variant run.
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Whether the configuration passed.
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// Whether the configuration failed.
    pub fn failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// External commands driven for every variant.
///
/// Defaults match an autotools project: `./configure` with debug, slow
/// tests and fatal warnings baked in, `make check` for build+test, and
/// the automake test-suite log for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildCommands {
    /// Configure program, resolved relative to the workspace.
    pub configure_program: String,

    /// Baseline flags prepended before every variant's own flags.
    pub baseline_flags: Vec<String>,

    /// Build+test program.
    pub build_program: String,

    /// Build+test arguments.
    pub build_args: Vec<String>,

    /// Diagnostic log path, relative to the workspace.
    pub log_path: PathBuf,

    /// Per-invocation wall-clock bound.
    pub timeout: Option<Duration>,
}

impl Default for BuildCommands {
    fn default() -> Self {
        Self {
            configure_program: "./configure".to_string(),
            baseline_flags: vec![
                "--enable-debug".to_string(),
                "--enable-slow-tests".to_string(),
                "--enable-fatal-warnings".to_string(),
                "--quiet".to_string(),
            ],
            build_program: "make".to_string(),
            build_args: vec!["check".to_string()],
            log_path: PathBuf::from("tests/test-suite.log"),
            timeout: None,
        }
    }
}

/// Drives configure → build+test for a single configuration.
///
/// Every execution issue resolves to a terminal [`ExecutionResult`];
/// no error escapes to the orchestrator.
pub struct VariantExecutor {
    runner: Arc<dyn ProcessRunner>,
    workspace: PathBuf,
    commands: BuildCommands,
}

impl VariantExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>, workspace: PathBuf, commands: BuildCommands) -> Self {
        Self {
            runner,
            workspace,
            commands,
        }
    }

    /// Run one configuration against the captured environment.
    ///
    /// The variant's overrides are merged over the snapshot for this
    /// invocation only; the snapshot itself is never touched, so nothing
    /// leaks into the next variant.
    pub async fn execute(
        &self,
        config: &Configuration,
        snapshot: &EnvironmentSnapshot,
    ) -> ExecutionResult {
        let start = Instant::now();
        let env = snapshot.merged(&config.env_overrides);

        info!(configuration = %config.name, "configuring");
        let mut configure_args = self.commands.baseline_flags.clone();
        configure_args.extend(config.configure_flags.iter().cloned());

        let configure_request = ProcessRequest {
            command: self.commands.configure_program.clone(),
            args: configure_args,
            env: env.clone(),
            cwd: self.workspace.clone(),
            timeout: self.commands.timeout,
        };

        let configure = match self.runner.run(&configure_request).await {
            Ok(output) => output,
            Err(err) => return self.runner_failure(config, Phase::Configure, err, start),
        };

        if !configure.success() {
            warn!(
                configuration = %config.name,
                exit_code = configure.exit_code,
                "configure failed; build+test not attempted"
            );
            return ExecutionResult {
                configuration: config.name.clone(),
                outcome: Outcome::Failed,
                exit_code: configure.exit_code,
                failed_phase: Some(Phase::Configure),
                log_excerpt: excerpt(&configure.combined_output),
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }

        info!(configuration = %config.name, "building and testing");
        let build_args = config
            .build_args
            .clone()
            .unwrap_or_else(|| self.commands.build_args.clone());
        let build_request = ProcessRequest {
            command: self.commands.build_program.clone(),
            args: build_args,
            env,
            cwd: self.workspace.clone(),
            timeout: self.commands.timeout,
        };

        let build = match self.runner.run(&build_request).await {
            Ok(output) => output,
            Err(err) => return self.runner_failure(config, Phase::BuildTest, err, start),
        };

        if !build.success() {
            warn!(
                configuration = %config.name,
                exit_code = build.exit_code,
                "build+test failed"
            );
            return ExecutionResult {
                configuration: config.name.clone(),
                outcome: Outcome::Failed,
                exit_code: build.exit_code,
                failed_phase: Some(Phase::BuildTest),
                log_excerpt: self.read_diagnostic_log().await,
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }

        info!(configuration = %config.name, "passed");
        ExecutionResult {
            configuration: config.name.clone(),
            outcome: Outcome::Passed,
            exit_code: 0,
            failed_phase: None,
            log_excerpt: None,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Read the well-known diagnostic log, best-effort: a missing or
    /// unreadable log is simply absent, never a secondary error.
    async fn read_diagnostic_log(&self) -> Option<String> {
        let path = self.workspace.join(&self.commands.log_path);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => excerpt(&contents),
            Err(_) => None,
        }
    }

    /// Map a runner error to a terminal result. Spawn failures become
    /// `Skipped` when the configuration opted in, `Failed` otherwise.
    fn runner_failure(
        &self,
        config: &Configuration,
        phase: Phase,
        err: MatrixError,
        start: Instant,
    ) -> ExecutionResult {
        let skippable = config.skip_on_missing_tool && matches!(err, MatrixError::Spawn { .. });
        if skippable {
            info!(configuration = %config.name, error = %err, "tool missing; skipping");
        } else {
            warn!(configuration = %config.name, error = %err, "execution error");
        }

        ExecutionResult {
            configuration: config.name.clone(),
            outcome: if skippable { Outcome::Skipped } else { Outcome::Failed },
            exit_code: -1,
            failed_phase: (!skippable).then_some(phase),
            log_excerpt: Some(err.to_string()),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Trailing lines of a diagnostic source; `None` when there is nothing.
fn excerpt(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let lines: Vec<&str> = text.lines().collect();
    let tail = if lines.len() > EXCERPT_MAX_LINES {
        &lines[lines.len() - EXCERPT_MAX_LINES..]
    } else {
        &lines[..]
    };
    Some(tail.join("\n"))
}
