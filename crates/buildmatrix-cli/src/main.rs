//! buildmatrix - build-variant test matrix driver
//!
//! Rebuilds the project under a fixed set of compile-time feature
//! permutations and reports aggregate pass/fail, plus one-shot hooks into
//! packaging, static analysis and ABI tooling.
//!
//! ## Commands
//!
//! - Build variants: `ansi`, `nosection`, `sysv`, `noepoll`, `nogettime`,
//!   `bsd`, `dist`, `rpm`, `mac` (each stops at its first failure)
//! - `all`: every variant in order, continuing past failures
//! - Tooling: `mock`, `coverity`, `clang`, `abi <ver1> <ver2>`,
//!   `api-sanity`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use buildmatrix_core::{
    git, init_tracing, BuildCommands, CommandRunner, ConfigurationRegistry, EnvironmentSnapshot,
    FailurePolicy, MatrixIdentity, Orchestrator, ProcessRunner, Selection, ToolKit,
    VariantExecutor,
};

#[derive(Debug, Parser)]
#[command(name = "buildmatrix")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build-variant test matrix driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit the report and log lines as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Per-invocation timeout for external commands, in seconds (0 disables)
    #[arg(long, global = true, default_value_t = 3600)]
    timeout_secs: u64,

    /// Run from this directory instead of locating the repository root
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build and test in strict ANSI C mode
    Ansi,

    /// Build and test with linker section attributes disabled
    Nosection,

    /// Build and test with SysV semaphores instead of POSIX
    Sysv,

    /// Build and test with poll(2) instead of epoll(7)
    Noepoll,

    /// Build and test without monotonic clock support
    Nogettime,

    /// Build and test a BSD-like configuration
    Bsd,

    /// Build and test a Mac-like configuration
    Mac,

    /// Run every build variant in order, continuing past failures
    All,

    /// Configure, then run `make distcheck`
    Dist,

    /// Configure, then build binary RPM packages
    Rpm,

    /// Build a source RPM and rebuild it inside mock
    Mock,

    /// Run the build under the Coverity capture tool
    Coverity,

    /// Run the clang static analyzer over the build
    Clang,

    /// Compare library ABI between two released versions
    Abi {
        /// Old version (tag `v<ver1>`)
        ver1: String,

        /// New version (tag `v<ver2>`)
        ver2: String,
    },

    /// Run the API sanity checker and open its report
    #[command(alias = "api_sanity")]
    ApiSanity,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Requested help/version is a success; anything else (unknown
            // or missing command, bad arguments) exits 1 with nothing run.
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    // Ambient state is captured exactly once; variants only ever see
    // scoped copies of it.
    let snapshot = EnvironmentSnapshot::capture();

    let root = match &cli.workdir {
        Some(dir) => dir.clone(),
        None => git::find_repo_root(Path::new("."))
            .context("not inside a version-controlled project (try --workdir)")?,
    };
    let _workdir = git::WorkdirGuard::enter(&root)?;

    let timeout = (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs));
    let runner: Arc<dyn ProcessRunner> = Arc::new(CommandRunner::new());

    match &cli.command {
        Commands::Ansi => run_variants(&cli, runner, &root, &snapshot, named("ansi"), timeout).await,
        Commands::Nosection => {
            run_variants(&cli, runner, &root, &snapshot, named("nosection"), timeout).await
        }
        Commands::Sysv => run_variants(&cli, runner, &root, &snapshot, named("sysv"), timeout).await,
        Commands::Noepoll => {
            run_variants(&cli, runner, &root, &snapshot, named("noepoll"), timeout).await
        }
        Commands::Nogettime => {
            run_variants(&cli, runner, &root, &snapshot, named("nogettime"), timeout).await
        }
        Commands::Bsd => run_variants(&cli, runner, &root, &snapshot, named("bsd"), timeout).await,
        Commands::Mac => run_variants(&cli, runner, &root, &snapshot, named("mac"), timeout).await,
        Commands::All => run_variants(&cli, runner, &root, &snapshot, Selection::All, timeout).await,
        Commands::Dist => run_variants(&cli, runner, &root, &snapshot, named("dist"), timeout).await,
        Commands::Rpm => run_variants(&cli, runner, &root, &snapshot, named("rpm"), timeout).await,
        Commands::Mock => {
            let kit = toolkit(runner, &root, timeout);
            Ok(kit.mock(&snapshot).await?)
        }
        Commands::Coverity => {
            let kit = toolkit(runner, &root, timeout);
            Ok(kit.coverity(&snapshot).await?)
        }
        Commands::Clang => {
            let kit = toolkit(runner, &root, timeout);
            Ok(kit.clang(&snapshot).await?)
        }
        Commands::Abi { ver1, ver2 } => {
            let kit = toolkit(runner, &root, timeout);
            Ok(kit.abi(&snapshot, ver1, ver2).await?)
        }
        Commands::ApiSanity => {
            let kit = toolkit(runner, &root, timeout);
            Ok(kit.api_sanity(&snapshot).await?)
        }
    }
}

fn named(name: &str) -> Selection {
    Selection::Named(vec![name.to_string()])
}

fn toolkit(runner: Arc<dyn ProcessRunner>, root: &Path, timeout: Option<Duration>) -> ToolKit {
    ToolKit::new(runner, root.to_path_buf(), project_name(root), timeout)
}

/// Library name handed to the ABI tooling: the project root's directory name.
fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "library".to_string())
}

async fn run_variants(
    cli: &Cli,
    runner: Arc<dyn ProcessRunner>,
    root: &Path,
    snapshot: &EnvironmentSnapshot,
    selection: Selection,
    timeout: Option<Duration>,
) -> Result<i32> {
    let registry = ConfigurationRegistry::builtin();
    let identity = MatrixIdentity::new(
        root.to_path_buf(),
        registry.list_all(),
        git::capture_head_sha(root).ok(),
    );
    info!(
        variants_digest = %identity.variants_digest,
        git_sha = identity.git_sha.as_deref().unwrap_or("unknown"),
        "matrix identity"
    );

    // Single named variants stop at the first failure; `all` keeps going
    // so the report covers the whole matrix.
    let policy = match selection {
        Selection::All => FailurePolicy::Continue,
        Selection::Named(_) => FailurePolicy::FailFast,
    };

    let commands = BuildCommands {
        timeout,
        ..BuildCommands::default()
    };
    let executor = VariantExecutor::new(runner, root.to_path_buf(), commands);
    let orchestrator = Orchestrator::new(registry, executor);

    // Ctrl-C aborts between configurations, keeping accumulated results.
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = orchestrator
        .run_selected(&selection, policy, snapshot)
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_summary());
    }

    Ok(if report.succeeded() { 0 } else { 1 })
}
