//! Integration tests for the build matrix with a scripted runner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildmatrix_core::fakes::ScriptedRunner;
use buildmatrix_core::{
    BuildCommands, ConfigurationRegistry, EnvironmentSnapshot, FailurePolicy, MatrixError,
    Orchestrator, Outcome, OverallOutcome, Phase, Selection, ToolKit, VariantExecutor,
};

const BUILTIN_ORDER: [&str; 9] = [
    "ansi",
    "nosection",
    "sysv",
    "noepoll",
    "nogettime",
    "bsd",
    "dist",
    "rpm",
    "mac",
];

fn orchestrator(runner: Arc<ScriptedRunner>, workspace: PathBuf) -> Orchestrator {
    let executor = VariantExecutor::new(runner, workspace, BuildCommands::default());
    Orchestrator::new(ConfigurationRegistry::builtin(), executor)
}

fn snapshot() -> EnvironmentSnapshot {
    EnvironmentSnapshot::from_vars([("PATH", "/usr/bin"), ("CFLAGS", "-O2")])
}

/// Test: `all` with every simulated build+test succeeding.
#[tokio::test]
async fn test_all_variants_pass() {
    let runner = Arc::new(ScriptedRunner::all_passing());
    let orchestrator = orchestrator(runner.clone(), PathBuf::from("."));

    let report = orchestrator
        .run_selected(&Selection::All, FailurePolicy::Continue, &snapshot())
        .await
        .expect("matrix run failed");

    assert_eq!(report.overall, OverallOutcome::AllPassed);
    assert_eq!(report.results.len(), BUILTIN_ORDER.len());
    let names: Vec<&str> = report
        .results
        .iter()
        .map(|r| r.configuration.as_str())
        .collect();
    assert_eq!(names, BUILTIN_ORDER);
    // Two processes per variant: configure, then build+test.
    assert_eq!(runner.invocation_count(), BUILTIN_ORDER.len() * 2);
}

/// Test: `all` covers the packaging targets alongside the feature variants.
#[tokio::test]
async fn test_all_runs_packaging_targets() {
    let runner = Arc::new(ScriptedRunner::all_passing());
    let orchestrator = orchestrator(runner.clone(), PathBuf::from("."));

    orchestrator
        .run_selected(&Selection::All, FailurePolicy::Continue, &snapshot())
        .await
        .expect("matrix run failed");

    let requests = runner.requests();
    // dist is the seventh variant, rpm the eighth; each configures first,
    // then runs its own make target instead of `check`.
    assert_eq!(requests[12].command, "./configure");
    assert_eq!(requests[13].command, "make");
    assert_eq!(requests[13].args, vec!["distcheck".to_string()]);
    assert_eq!(requests[15].args, vec!["rpm".to_string()]);
    assert_eq!(requests[17].args, vec!["check".to_string()]);
}

/// Test: exactly one variant fails under continue-on-failure.
#[tokio::test]
async fn test_single_failure_does_not_abort_the_matrix() {
    let runner = Arc::new(ScriptedRunner::default());
    // ansi and nosection pass (2 processes each), sysv's build+test fails,
    // everything after passes (script exhausted -> success).
    for _ in 0..4 {
        runner.push_exit(0, "");
    }
    runner.push_exit(0, ""); // sysv configure
    runner.push_exit(2, "make: *** [check] Error 2"); // sysv build+test

    let orchestrator = orchestrator(runner.clone(), PathBuf::from("."));
    let report = orchestrator
        .run_selected(&Selection::All, FailurePolicy::Continue, &snapshot())
        .await
        .expect("matrix run failed");

    assert_eq!(report.overall, OverallOutcome::SomeFailed);
    assert_eq!(report.results.len(), BUILTIN_ORDER.len());
    assert_eq!(report.failed_count(), 1);

    for result in &report.results {
        if result.configuration == "sysv" {
            assert_eq!(result.outcome, Outcome::Failed);
            assert_eq!(result.failed_phase, Some(Phase::BuildTest));
        } else {
            assert_eq!(result.outcome, Outcome::Passed, "{}", result.configuration);
        }
    }
}

/// Test: fail-fast on a single named variant whose configure step fails.
#[tokio::test]
async fn test_fail_fast_stops_after_configure_failure() {
    let runner = Arc::new(ScriptedRunner::default());
    runner.push_exit(77, "configure: error: C compiler cannot create executables");

    let orchestrator = orchestrator(runner.clone(), PathBuf::from("."));
    let report = orchestrator
        .run_selected(
            &Selection::Named(vec!["ansi".to_string()]),
            FailurePolicy::FailFast,
            &snapshot(),
        )
        .await
        .expect("matrix run failed");

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome, Outcome::Failed);
    assert_eq!(report.results[0].failed_phase, Some(Phase::Configure));
    // The build+test phase was never invoked.
    assert_eq!(runner.invocation_count(), 1);
}

/// Test: a variant's environment overrides never leak into the next one.
#[tokio::test]
async fn test_overrides_do_not_leak_across_variants() {
    let runner = Arc::new(ScriptedRunner::all_passing());
    let orchestrator = orchestrator(runner.clone(), PathBuf::from("."));

    orchestrator
        .run_selected(&Selection::All, FailurePolicy::Continue, &snapshot())
        .await
        .expect("matrix run failed");

    let requests = runner.requests();
    // Registry order: sysv is the third variant, noepoll the fourth.
    let sysv_configure = &requests[4];
    let noepoll_configure = &requests[6];
    assert!(sysv_configure.args.contains(&"--disable-posix-sems".to_string()));
    assert_eq!(
        sysv_configure.env.get("DISABLE_PSHARED").map(String::as_str),
        Some("1")
    );
    assert!(noepoll_configure.args.contains(&"--disable-epoll".to_string()));
    assert!(noepoll_configure.env.get("DISABLE_PSHARED").is_none());

    // ansi's CFLAGS override is equally scoped.
    assert_eq!(requests[0].env.get("CFLAGS").map(String::as_str), Some("-ansi"));
    assert_eq!(requests[2].env.get("CFLAGS").map(String::as_str), Some("-O2"));
}

/// Test: missing diagnostic log leaves the excerpt absent.
#[tokio::test]
async fn test_missing_log_is_not_an_error() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::default());
    runner.push_exit(0, ""); // configure
    runner.push_exit(1, ""); // build+test fails, no log on disk

    let orchestrator = orchestrator(runner, workspace.path().to_path_buf());
    let report = orchestrator
        .run_selected(
            &Selection::Named(vec!["bsd".to_string()]),
            FailurePolicy::FailFast,
            &snapshot(),
        )
        .await
        .expect("matrix run failed");

    assert_eq!(report.results[0].outcome, Outcome::Failed);
    assert!(report.results[0].log_excerpt.is_none());
}

/// Test: an unknown configuration name executes nothing.
#[tokio::test]
async fn test_unknown_configuration_runs_nothing() {
    let runner = Arc::new(ScriptedRunner::all_passing());
    let orchestrator = orchestrator(runner.clone(), PathBuf::from("."));

    let err = orchestrator
        .run_selected(
            &Selection::Named(vec!["ansi".to_string(), "plan9".to_string()]),
            FailurePolicy::Continue,
            &snapshot(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MatrixError::ConfigurationNotFound(name) if name == "plan9"));
    assert_eq!(runner.invocation_count(), 0);
}

/// Test: the diagnostic log is surfaced into the failing result.
#[tokio::test]
async fn test_diagnostic_log_surfaced_on_failure() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::create_dir(workspace.path().join("tests")).unwrap();
    std::fs::write(
        workspace.path().join("tests/test-suite.log"),
        "FAIL: check_loop\ntimer drifted\n",
    )
    .unwrap();

    let runner = Arc::new(ScriptedRunner::default());
    runner.push_exit(0, "");
    runner.push_exit(2, "");

    let orchestrator = orchestrator(runner, workspace.path().to_path_buf());
    let report = orchestrator
        .run_selected(
            &Selection::Named(vec!["nogettime".to_string()]),
            FailurePolicy::FailFast,
            &snapshot(),
        )
        .await
        .expect("matrix run failed");

    let excerpt = report.results[0].log_excerpt.as_deref().unwrap();
    assert!(excerpt.contains("FAIL: check_loop"));

    let summary = report.render_summary();
    assert!(summary.contains("FAIL: check_loop"));
    assert!(summary.contains("*** FAILED: nogettime"));
}

// ---------------------------------------------------------------------------
// ABI comparison (real git repository, scripted external tools)
// ---------------------------------------------------------------------------

fn git(repo_dir: &Path, args: &[&str]) {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn make_tagged_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init"]);
    git(dir.path(), &["config", "user.name", "test-user"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["commit", "--allow-empty", "-m", "1.0.0"]);
    git(dir.path(), &["tag", "v1.0.0"]);
    git(dir.path(), &["commit", "--allow-empty", "-m", "1.1.0"]);
    git(dir.path(), &["tag", "v1.1.0"]);
    git(dir.path(), &["commit", "--allow-empty", "-m", "head"]);
    dir
}

#[tokio::test]
async fn test_abi_builds_both_tags_and_restores_head() {
    let repo = make_tagged_repo();
    let head = buildmatrix_core::git::capture_head_sha(repo.path()).unwrap();

    let runner = Arc::new(ScriptedRunner::all_passing());
    let kit = ToolKit::new(
        runner.clone(),
        repo.path().to_path_buf(),
        "libexample".to_string(),
        None,
    );
    let snapshot = EnvironmentSnapshot::from_vars([
        ("PATH", std::env::var("PATH").unwrap_or_default()),
        ("BROWSER", "true".to_string()),
    ]);

    let code = kit.abi(&snapshot, "1.0.0", "1.1.0").await.unwrap();
    assert_eq!(code, 0);

    // configure + make + dump per tag, then the final comparison.
    let requests = runner.requests();
    assert_eq!(requests.len(), 7);
    assert_eq!(requests[0].command, "./configure");
    assert_eq!(requests[2].command, "abi-compliance-checker");
    assert!(requests[2].args.contains(&"-dump".to_string()));
    assert!(requests[6].args.contains(&"-old".to_string()));
    assert!(requests[6].args.contains(&"-new".to_string()));

    // HEAD is back where it started.
    assert_eq!(
        buildmatrix_core::git::capture_head_sha(repo.path()).unwrap(),
        head
    );
}
