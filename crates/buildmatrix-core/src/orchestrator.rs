//! Sequential orchestration of build variants.
//!
//! Variants run strictly one at a time, in registry order: every variant
//! reconfigures and rebuilds the same on-disk build tree, so the tree is
//! exclusively owned by whichever variant is currently executing. This is
//! an invariant, not a missing feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::env::EnvironmentSnapshot;
use crate::error::Result;
use crate::executor::VariantExecutor;
use crate::identity::variants_digest;
use crate::registry::{Configuration, ConfigurationRegistry};
use crate::report::{ReportCollector, RunReport};

/// Which configurations to run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Selection {
    /// Every registered configuration, in registration order.
    All,

    /// The named configurations, in the given order.
    Named(Vec<String>),
}

/// What to do after a configuration fails.
///
/// `all` runs continue so the report covers the whole matrix; single named
/// invocations stop at the first failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    Continue,
    FailFast,
}

/// Cooperative cancellation flag, honored between configurations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The run aborts before its next configuration.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives selected configurations through the executor and aggregates a
/// [`RunReport`].
pub struct Orchestrator {
    registry: ConfigurationRegistry,
    executor: VariantExecutor,
    cancel: CancelToken,
}

impl Orchestrator {
    pub fn new(registry: ConfigurationRegistry, executor: VariantExecutor) -> Self {
        Self {
            registry,
            executor,
            cancel: CancelToken::new(),
        }
    }

    /// Token callers can use to abort the run between configurations.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the selected configurations sequentially.
    ///
    /// Unknown names fail with `ConfigurationNotFound` before anything
    /// executes. Per-configuration failures never abort the run under
    /// `Continue`; under `FailFast` the first failure ends it. A pending
    /// cancellation finalizes the report as `Aborted` with whatever
    /// results have accumulated.
    pub async fn run_selected(
        &self,
        selection: &Selection,
        policy: FailurePolicy,
        snapshot: &EnvironmentSnapshot,
    ) -> Result<RunReport> {
        let selected: Vec<Configuration> = match selection {
            Selection::All => self.registry.list_all().to_vec(),
            Selection::Named(names) => names
                .iter()
                .map(|name| self.registry.get(name).cloned())
                .collect::<Result<_>>()?,
        };

        let mut collector = ReportCollector::new(variants_digest(&selected));
        info!(
            selected = selected.len(),
            policy = ?policy,
            "starting build matrix run"
        );

        let mut aborted = false;
        for config in &selected {
            if self.cancel.is_cancelled() {
                warn!(configuration = %config.name, "cancellation requested; aborting run");
                aborted = true;
                break;
            }

            let result = self.executor.execute(config, snapshot).await;
            let failed = result.failed();
            collector.record(result);

            if failed && policy == FailurePolicy::FailFast {
                info!(configuration = %config.name, "stopping on first failure");
                break;
            }
        }

        let report = collector.finalize(aborted);
        info!(
            run_id = %report.run_id,
            passed = report.passed_count(),
            failed = report.failed_count(),
            outcome = ?report.overall,
            "build matrix run finished"
        );
        Ok(report)
    }
}
