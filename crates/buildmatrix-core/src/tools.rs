//! One-shot external tool invocations.
//!
//! Mock rebuilds, static analysis and ABI comparison are operational
//! procedures, not build variants: each is a fixed sequence of external
//! commands whose exit code is propagated to the caller. Nothing here
//! feeds the matrix report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::env::EnvironmentSnapshot;
use crate::error::{MatrixError, Result};
use crate::git;
use crate::process::{ProcessRequest, ProcessRunner};

/// Invokes packaging, analysis and ABI tooling from the project root.
pub struct ToolKit {
    runner: Arc<dyn ProcessRunner>,
    workspace: PathBuf,
    /// Library name handed to the ABI and API tooling.
    project: String,
    timeout: Option<Duration>,
}

impl ToolKit {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        workspace: PathBuf,
        project: String,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            workspace,
            project,
            timeout,
        }
    }

    /// Build a source RPM and rebuild it inside mock.
    pub async fn mock(&self, snapshot: &EnvironmentSnapshot) -> Result<i32> {
        let code = self.run_tool(snapshot, "make", &["srpm"]).await?;
        if code != 0 {
            return Ok(code);
        }
        let srpm = self.find_srpm()?;
        self.run_tool(snapshot, "mock", &["--rebuild", &srpm])
            .await
    }

    /// Coverity scan: `cov-build` wrapping `make`. A missing `cov-build`
    /// only warns; the spawn failure surfaces on its own if it is truly
    /// absent at invocation time.
    pub async fn coverity(&self, snapshot: &EnvironmentSnapshot) -> Result<i32> {
        if !tool_available(snapshot, "cov-build") {
            warn!("cov-build not found in PATH; Coverity scan will likely fail");
        }
        self.run_tool(snapshot, "cov-build", &["--dir", "cov-int", "make"])
            .await
    }

    /// Clang static analyzer: `scan-build make`. Aborts with
    /// `PrerequisiteMissing` when `scan-build` is not installed.
    pub async fn clang(&self, snapshot: &EnvironmentSnapshot) -> Result<i32> {
        if !tool_available(snapshot, "scan-build") {
            return Err(MatrixError::PrerequisiteMissing {
                tool: "scan-build".to_string(),
                hint: "install clang-analyzer".to_string(),
            });
        }
        self.run_tool(snapshot, "scan-build", &["-o", "clang-reports", "make"])
            .await
    }

    /// ABI compatibility between two released versions.
    ///
    /// Checks out `v<ver1>` and `v<ver2>` in turn, builds each and dumps
    /// its ABI, restores the original HEAD, then compares the dumps and
    /// opens the HTML report in the preferred browser.
    pub async fn abi(
        &self,
        snapshot: &EnvironmentSnapshot,
        ver1: &str,
        ver2: &str,
    ) -> Result<i32> {
        if !tool_available(snapshot, "abi-compliance-checker") {
            warn!("abi-compliance-checker not found in PATH; ABI comparison will likely fail");
        }

        let head = git::capture_head_sha(&self.workspace)?;
        let result = self.abi_dumps(snapshot, &[ver1, ver2]).await;
        if let Err(err) = git::checkout(&self.workspace, &head) {
            warn!(error = %err, "failed to restore original HEAD after ABI dumps");
        }
        let code = result?;
        if code != 0 {
            return Ok(code);
        }

        let old = self.abi_dump_path(ver1);
        let new = self.abi_dump_path(ver2);
        let code = self
            .run_tool(
                snapshot,
                "abi-compliance-checker",
                &["-lib", &self.project, "-old", &old, "-new", &new],
            )
            .await?;

        if code == 0 {
            let report = self.workspace.join(format!(
                "compat_reports/{}/{}_to_{}/compat_report.html",
                self.project, ver1, ver2
            ));
            open_report(snapshot, &report);
        }
        Ok(code)
    }

    /// API sanity checker over the current tree; opens the HTML report
    /// on success.
    pub async fn api_sanity(&self, snapshot: &EnvironmentSnapshot) -> Result<i32> {
        if !tool_available(snapshot, "api-sanity-checker") {
            warn!("api-sanity-checker not found in PATH; API check will likely fail");
        }

        let descriptor = self.write_descriptor("current")?;
        let descriptor = descriptor.to_string_lossy().into_owned();
        let code = self
            .run_tool(
                snapshot,
                "api-sanity-checker",
                &["-lib", &self.project, "-d", &descriptor, "-gen", "-build", "-run"],
            )
            .await?;

        if code == 0 {
            let report = self
                .workspace
                .join(format!("test_results/{}/current/test_results.html", self.project));
            open_report(snapshot, &report);
        }
        Ok(code)
    }

    /// Check out, build and ABI-dump each version tag in turn.
    /// Returns the first non-zero exit code encountered.
    async fn abi_dumps(&self, snapshot: &EnvironmentSnapshot, versions: &[&str]) -> Result<i32> {
        for version in versions {
            let tag = format!("v{version}");
            info!(%tag, "building ABI dump");
            git::checkout(&self.workspace, &tag)?;

            let code = self.run_tool(snapshot, "./configure", &[]).await?;
            if code != 0 {
                return Ok(code);
            }
            let code = self.run_tool(snapshot, "make", &[]).await?;
            if code != 0 {
                return Ok(code);
            }

            let descriptor = self.write_descriptor(version)?;
            let descriptor = descriptor.to_string_lossy().into_owned();
            let code = self
                .run_tool(
                    snapshot,
                    "abi-compliance-checker",
                    &["-lib", &self.project, "-dump", &descriptor],
                )
                .await?;
            if code != 0 {
                return Ok(code);
            }
        }
        Ok(0)
    }

    /// Conventional dump location produced by `-dump`.
    fn abi_dump_path(&self, version: &str) -> String {
        format!("abi_dumps/{}/{}/ABI.dump", self.project, version)
    }

    /// Minimal descriptor XML pointing the checker at the built tree.
    fn write_descriptor(&self, version: &str) -> Result<PathBuf> {
        let path = self.workspace.join(format!("abi-{version}.xml"));
        let root = self.workspace.display();
        let descriptor = format!(
            "<version>\n    {version}\n</version>\n\n\
             <headers>\n    {root}/include\n</headers>\n\n\
             <libs>\n    {root}/.libs\n</libs>\n"
        );
        std::fs::write(&path, descriptor)?;
        Ok(path)
    }

    /// Newest source RPM left in the project root by `make srpm`.
    /// Newest by modification time: version strings do not sort
    /// lexicographically ("-1.10-" sorts before "-1.9-").
    fn find_srpm(&self) -> Result<String> {
        let mut srpms: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.workspace)? {
            let entry = entry?;
            let path = entry.path();
            let is_srpm = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".src.rpm"))
                .unwrap_or(false);
            if !is_srpm {
                continue;
            }
            srpms.push((entry.metadata()?.modified()?, path));
        }
        srpms.sort();

        srpms
            .pop()
            .map(|(_, p)| p.to_string_lossy().into_owned())
            .ok_or_else(|| {
                MatrixError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "make srpm produced no .src.rpm",
                ))
            })
    }

    async fn run_tool(
        &self,
        snapshot: &EnvironmentSnapshot,
        command: &str,
        args: &[&str],
    ) -> Result<i32> {
        let request = ProcessRequest {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: snapshot.to_map(),
            cwd: self.workspace.clone(),
            timeout: self.timeout,
        };

        info!(command = %request.display(), "invoking external tool");
        let output = self.runner.run(&request).await?;
        if !output.success() {
            warn!(
                command = %request.display(),
                exit_code = output.exit_code,
                "external tool failed"
            );
        }
        Ok(output.exit_code)
    }
}

/// Whether `tool` resolves through the snapshot's `PATH`.
fn tool_available(snapshot: &EnvironmentSnapshot, tool: &str) -> bool {
    let Some(path) = snapshot.get("PATH") else {
        return false;
    };
    std::env::split_paths(path).any(|dir| dir.join(tool).is_file())
}

/// Open an HTML report in the preferred viewer. Best-effort: a missing
/// browser only logs.
fn open_report(snapshot: &EnvironmentSnapshot, report: &std::path::Path) {
    let browser = snapshot.browser();
    info!(%browser, report = %report.display(), "opening report");
    match std::process::Command::new(browser).arg(report).spawn() {
        Ok(_) => {}
        Err(err) => warn!(%browser, error = %err, "failed to open report viewer"),
    }
}
