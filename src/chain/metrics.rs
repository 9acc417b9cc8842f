use super::parent::{resolve_parent, ParentRef};
use crate::git::{self, GitRunner};
use serde::Serialize;
use std::path::Path;

/// Changed-line totals for the current branch, split by where they came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeMetric {
    pub branch: String,
    pub parent: ParentRef,
    pub total: u64,
    /// Committed changes since the merge-base with the parent (0 for roots)
    pub branch_portion: u64,
    /// Uncommitted changes against HEAD
    pub working_portion: u64,
}

impl ChangeMetric {
    pub fn new(branch: String, parent: ParentRef, branch_portion: u64, working_portion: u64) -> Self {
        ChangeMetric {
            branch,
            parent,
            total: branch_portion.saturating_add(working_portion),
            branch_portion,
            working_portion,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent == ParentRef::Root
    }
}

/// Measure the current branch.
///
/// Root branches count working-tree changes only. Chained branches add the
/// changes made since diverging from the inferred parent. Both portions are
/// always measured so the breakdown can be shown.
pub fn compute_total(git: &dyn GitRunner, repo: &Path) -> ChangeMetric {
    let branch = match git::current_branch(git, repo) {
        Ok(b) if !b.is_empty() => b,
        Ok(_) => {
            log::warn!("HEAD is detached, measuring working tree only");
            return ChangeMetric::new(String::new(), ParentRef::Root, 0, working(git, repo));
        }
        Err(e) => {
            log::warn!("Could not determine current branch, measuring working tree only: {:#}", e);
            return ChangeMetric::new(String::new(), ParentRef::Root, 0, working(git, repo));
        }
    };

    let parent = resolve_parent(git, repo, &branch);
    let branch_portion = match parent.merge_base_range() {
        Some(range) => git::compute_changed_lines(git, repo, &range),
        None => 0,
    };
    let working_portion = working(git, repo);

    log::debug!(
        "{} vs {}: {} committed + {} uncommitted",
        branch,
        parent,
        branch_portion,
        working_portion
    );

    ChangeMetric::new(branch, parent, branch_portion, working_portion)
}

fn working(git: &dyn GitRunner, repo: &Path) -> u64 {
    git::compute_changed_lines(git, repo, "HEAD")
}
