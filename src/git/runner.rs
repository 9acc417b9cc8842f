use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Runs a git command in a working directory and returns its stdout.
///
/// Every git call the engine makes goes through this seam, so tests can
/// script responses without a real repository.
pub trait GitRunner: Send + Sync {
    fn run(&self, repo: &Path, args: &[&str]) -> Result<String>;
}

/// The `git` binary on `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemGit;

impl GitRunner for SystemGit {
    fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo)
            .output()
            .with_context(|| format!("Failed to run git {} in '{}'", args.join(" "), repo.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn system_git_reports_args_and_stderr_on_failure() {
        let dir = TempDir::new().unwrap();
        let err = SystemGit
            .run(dir.path(), &["rev-parse", "--verify", "no-such-ref"])
            .unwrap_err()
            .to_string();
        assert!(err.contains("git rev-parse --verify no-such-ref"), "{err}");
    }

    #[test]
    fn system_git_returns_stdout_on_success() {
        let dir = TempDir::new().unwrap();
        let out = SystemGit.run(dir.path(), &["--version"]).unwrap();
        assert!(out.starts_with("git version"));
    }
}
