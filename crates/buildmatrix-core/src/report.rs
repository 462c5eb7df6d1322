//! Aggregation of per-configuration results into a final run report.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::executor::ExecutionResult;

/// Verdict over a whole matrix run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallOutcome {
    /// No configuration failed.
    AllPassed,

    /// At least one configuration failed.
    SomeFailed,

    /// The run was interrupted before all selected configurations ran.
    Aborted,
}

/// Final, frozen report of a matrix run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    /// Unique ID of this run.
    pub run_id: String,

    /// UTC time the run started.
    pub started_at: DateTime<Utc>,

    /// Digest of the selected variant definitions (stable run identity).
    pub variants_digest: String,

    /// Per-configuration results, in execution order.
    pub results: Vec<ExecutionResult>,

    /// Aggregate verdict.
    pub overall: OverallOutcome,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Number of configurations that passed.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Number of configurations that failed.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.failed()).count()
    }

    /// Whether the run finished with every configuration passing.
    pub fn succeeded(&self) -> bool {
        self.overall == OverallOutcome::AllPassed
    }

    /// Human-readable summary: diagnostic excerpts first, then a failure
    /// banner per failed configuration, then one line per result.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();

        for result in self.results.iter().filter(|r| r.failed()) {
            if let Some(excerpt) = &result.log_excerpt {
                out.push_str(&format!("--- diagnostics: {} ---\n", result.configuration));
                out.push_str(excerpt);
                if !excerpt.ends_with('\n') {
                    out.push('\n');
                }
            }
            out.push_str(&format!(
                "*** FAILED: {} (exit code {}) ***\n",
                result.configuration, result.exit_code
            ));
        }

        out.push_str(&format!(
            "build matrix {}: {} passed, {} failed, {} total ({} ms)\n",
            match self.overall {
                OverallOutcome::AllPassed => "passed",
                OverallOutcome::SomeFailed => "FAILED",
                OverallOutcome::Aborted => "ABORTED",
            },
            self.passed_count(),
            self.failed_count(),
            self.results.len(),
            self.duration_ms,
        ));

        for result in &self.results {
            let status = match result.outcome {
                crate::executor::Outcome::Passed => "PASS",
                crate::executor::Outcome::Failed => "FAIL",
                crate::executor::Outcome::Skipped => "SKIP",
            };
            out.push_str(&format!(
                "  {status} {} ({} ms)\n",
                result.configuration, result.duration_ms
            ));
        }

        out
    }
}

/// Append-only collector of results, frozen into a [`RunReport`].
#[derive(Debug)]
pub struct ReportCollector {
    run_id: String,
    started_at: DateTime<Utc>,
    variants_digest: String,
    results: Vec<ExecutionResult>,
    start: Instant,
}

impl ReportCollector {
    /// Start collecting for a run over the given variant identity.
    pub fn new(variants_digest: String) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            variants_digest,
            results: Vec::new(),
            start: Instant::now(),
        }
    }

    /// Append a result in arrival order.
    pub fn record(&mut self, result: ExecutionResult) {
        self.results.push(result);
    }

    /// Results accumulated so far.
    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    /// Freeze the report. `aborted` marks a run interrupted before all
    /// selected configurations executed; otherwise the verdict is
    /// `SomeFailed` when any result failed and `AllPassed` when none did
    /// (skips do not fail a run).
    pub fn finalize(self, aborted: bool) -> RunReport {
        let overall = if aborted {
            OverallOutcome::Aborted
        } else if self.results.iter().any(|r| r.failed()) {
            OverallOutcome::SomeFailed
        } else {
            OverallOutcome::AllPassed
        };

        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            variants_digest: self.variants_digest,
            results: self.results,
            overall,
            duration_ms: self.start.elapsed().as_millis() as u64,
        }
    }
}
