//! Version-control collaborator.
//!
//! The matrix treats git as an external tool with a small surface: locate
//! the project root, read HEAD, and check out a reference (used by the ABI
//! comparison to build released tags). Invocations are synchronous; they
//! complete in well under a second and never run inside the build loop.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{MatrixError, Result};

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| MatrixError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MatrixError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Locate the root of the version-controlled project containing `dir`.
pub fn find_repo_root(dir: &Path) -> Result<PathBuf> {
    let root = run_git(dir, &["rev-parse", "--show-toplevel"])?;
    if root.is_empty() {
        return Err(MatrixError::Git(
            "git rev-parse --show-toplevel returned empty output".to_string(),
        ));
    }
    Ok(PathBuf::from(root))
}

/// Capture the HEAD commit SHA, if the directory is inside a repository.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let sha = run_git(repo_dir, &["rev-parse", "HEAD"])?;
    if sha.is_empty() {
        return Err(MatrixError::Git(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// Check out a reference (tag, branch or SHA) in the given repository.
pub fn checkout(repo_dir: &Path, reference: &str) -> Result<()> {
    run_git(repo_dir, &["checkout", reference]).map(|_| ())
}

/// Whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Restores the process working directory when dropped.
///
/// The CLI runs from the project root; this guard puts the caller back
/// where it started on exit, including on error paths.
#[derive(Debug)]
pub struct WorkdirGuard {
    original: PathBuf,
}

impl WorkdirGuard {
    /// Change into `dir`, remembering the current directory.
    pub fn enter(dir: &Path) -> Result<Self> {
        let original = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { original })
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        // Best-effort: the original directory may no longer exist.
        let _ = std::env::set_current_dir(&self.original);
    }
}
