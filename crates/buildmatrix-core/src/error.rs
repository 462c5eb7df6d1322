//! Error taxonomy for the build matrix.
//!
//! Per-variant build and test failures are *data* (`ExecutionResult`),
//! not errors: a non-zero exit from configure or build+test never raises
//! a `MatrixError`. This enum covers everything else — registry misuse,
//! unstartable or hung external tools, missing prerequisites, and the
//! version-control collaborator.

/// Errors produced by the build matrix.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("configuration already registered: {0}")]
    DuplicateConfiguration(String),

    #[error("configuration not found: {0}")]
    ConfigurationNotFound(String),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exceeded its {limit_secs}s time limit and was killed")]
    Timeout { command: String, limit_secs: u64 },

    #[error("required tool not installed: {tool} ({hint})")]
    PrerequisiteMissing { tool: String, hint: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for build matrix operations.
pub type Result<T> = std::result::Result<T, MatrixError>;
