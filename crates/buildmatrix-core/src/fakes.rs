//! Scripted process runner for tests (no external processes involved).
//!
//! Plays back a queue of scripted outcomes in FIFO order and records every
//! request it receives, so tests can assert on invocation counts and on the
//! exact environment each invocation saw.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{MatrixError, Result};
use crate::process::{ProcessOutput, ProcessRequest, ProcessRunner};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// The command ran and produced this output.
    Output(ProcessOutput),

    /// The command could not be started.
    SpawnError(String),

    /// The command exceeded its time limit.
    Timeout,
}

/// In-memory [`ProcessRunner`] driven by a script.
///
/// When the script is exhausted, every further invocation succeeds with
/// exit code 0 and empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    requests: Mutex<Vec<ProcessRequest>>,
}

impl ScriptedRunner {
    /// Runner whose every invocation succeeds.
    pub fn all_passing() -> Self {
        Self::default()
    }

    /// Queue an exit with the given code and output.
    pub fn push_exit(&self, exit_code: i32, combined_output: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedOutcome::Output(ProcessOutput {
                exit_code,
                combined_output: combined_output.to_string(),
            }));
    }

    /// Queue a spawn failure.
    pub fn push_spawn_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedOutcome::SpawnError(message.to_string()));
    }

    /// Queue a timeout.
    pub fn push_timeout(&self) {
        self.script.lock().unwrap().push_back(ScriptedOutcome::Timeout);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ProcessRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of invocations received so far.
    pub fn invocation_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput> {
        self.requests.lock().unwrap().push(request.clone());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            None => Ok(ProcessOutput {
                exit_code: 0,
                combined_output: String::new(),
            }),
            Some(ScriptedOutcome::Output(output)) => Ok(output),
            Some(ScriptedOutcome::SpawnError(message)) => Err(MatrixError::Spawn {
                command: request.display(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            }),
            Some(ScriptedOutcome::Timeout) => Err(MatrixError::Timeout {
                command: request.display(),
                limit_secs: request.timeout.map(|t| t.as_secs()).unwrap_or(0),
            }),
        }
    }
}
