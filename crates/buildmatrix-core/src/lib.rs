//! buildmatrix-core - build-variant test orchestration
//!
//! Runs a configure → build+test cycle for each of a declarative set of
//! named build configurations and aggregates pass/fail into a single
//! report:
//! - Registry of build variants (flags + scoped environment overrides)
//! - Sequential orchestration with continue-on-failure or fail-fast policy
//! - Diagnostic log capture on failure
//! - One-shot hooks for packaging, static analysis and ABI tooling

pub mod env;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod git;
pub mod identity;
pub mod orchestrator;
pub mod process;
pub mod registry;
pub mod report;
pub mod telemetry;
pub mod tools;

// Re-export key types
pub use env::EnvironmentSnapshot;
pub use error::{MatrixError, Result};
pub use executor::{BuildCommands, ExecutionResult, Outcome, Phase, VariantExecutor};
pub use identity::MatrixIdentity;
pub use orchestrator::{CancelToken, FailurePolicy, Orchestrator, Selection};
pub use process::{CommandRunner, ProcessOutput, ProcessRequest, ProcessRunner};
pub use registry::{BuiltinVariant, Configuration, ConfigurationRegistry};
pub use report::{OverallOutcome, ReportCollector, RunReport};
pub use telemetry::init_tracing;
pub use tools::ToolKit;
