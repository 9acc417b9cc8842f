use super::GitRunner;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Local and remote-tracking branch names, remote prefix stripped, de-duplicated
pub type BranchSet = BTreeSet<String>;

// ── Repo Info ──

/// A working tree root confirmed to hold git metadata.
/// Resolved fresh for every check; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    root: PathBuf,
}

impl RepoHandle {
    /// Resolve the repository containing `dir`
    pub fn resolve(git: &dyn GitRunner, dir: &Path) -> Result<Self> {
        let top = git
            .run(dir, &["rev-parse", "--show-toplevel"])
            .with_context(|| format!("Not a git repository: {}", dir.display()))?;
        let root = PathBuf::from(top.trim());

        if !root.is_absolute() {
            anyhow::bail!("git reported a relative repository root: {}", root.display());
        }
        // Linked worktrees carry a `.git` file instead of a directory
        if !root.join(".git").exists() {
            anyhow::bail!("No .git metadata under {}", root.display());
        }

        Ok(RepoHandle { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the working tree, used in root-derived branch names
    pub fn dir_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_string())
    }
}

/// Current branch name; empty when HEAD is detached
pub fn current_branch(git: &dyn GitRunner, repo: &Path) -> Result<String> {
    let out = git
        .run(repo, &["branch", "--show-current"])
        .context("Failed to get current branch")?;
    Ok(out.trim().to_string())
}

/// All local and remote-tracking branches
pub fn list_branches(git: &dyn GitRunner, repo: &Path) -> Result<BranchSet> {
    let out = git
        .run(repo, &["branch", "-a"])
        .context("Failed to list branches")?;
    Ok(parse_branch_list(&out))
}

/// Parse `git branch -a` output into bare branch names.
/// Strips the current/worktree markers and `remotes/<remote>/`, and drops
/// symbolic refs (`remotes/origin/HEAD -> origin/main`) and detached entries.
pub fn parse_branch_list(raw: &str) -> BranchSet {
    let mut branches = BranchSet::new();

    for line in raw.lines() {
        let line = line
            .trim_start_matches(['*', '+'])
            .trim();
        if line.is_empty() || line.starts_with('(') || line.contains(" -> ") {
            continue;
        }

        let name = match line.strip_prefix("remotes/") {
            Some(rest) => match rest.split_once('/') {
                Some((_remote, branch)) => branch,
                None => continue,
            },
            None => line,
        };

        if !name.is_empty() {
            branches.insert(name.to_string());
        }
    }

    branches
}

/// Whether `git remote -v` lists the named remote
pub fn has_remote(git: &dyn GitRunner, repo: &Path, remote: &str) -> Result<bool> {
    let out = git
        .run(repo, &["remote", "-v"])
        .context("Failed to list remotes")?;
    Ok(out
        .lines()
        .any(|l| l.split_whitespace().next() == Some(remote)))
}

/// Configured `user.name`
pub fn user_name(git: &dyn GitRunner, repo: &Path) -> Result<String> {
    let out = git
        .run(repo, &["config", "user.name"])
        .context("Failed to read user.name")?;
    let name = out.trim();
    if name.is_empty() {
        anyhow::bail!("user.name is not set");
    }
    Ok(name.to_string())
}

// ── Mutations ──

/// Stage a single file
pub fn stage_file(git: &dyn GitRunner, repo: &Path, file_path: &str) -> Result<()> {
    git.run(repo, &["add", "--", file_path])
        .with_context(|| format!("Failed to stage {}", file_path))?;
    Ok(())
}

pub fn commit(git: &dyn GitRunner, repo: &Path, message: &str) -> Result<()> {
    git.run(repo, &["commit", "-m", message])
        .context("Failed to commit")?;
    Ok(())
}

/// Push a branch; `set_upstream` adds `-u` for branches that have no upstream yet
pub fn push(
    git: &dyn GitRunner,
    repo: &Path,
    remote: &str,
    branch: &str,
    set_upstream: bool,
) -> Result<()> {
    let result = if set_upstream {
        git.run(repo, &["push", "-u", remote, branch])
    } else {
        git.run(repo, &["push", remote, branch])
    };
    result.with_context(|| format!("Failed to push {} to {}", branch, remote))?;
    Ok(())
}

/// Create a branch at HEAD and switch to it
pub fn checkout_new_branch(git: &dyn GitRunner, repo: &Path, branch: &str) -> Result<()> {
    git.run(repo, &["checkout", "-b", branch])
        .with_context(|| format!("Failed to create branch {}", branch))?;
    Ok(())
}
