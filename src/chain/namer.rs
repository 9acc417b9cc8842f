use super::parent::{is_root_branch, split_numeric_suffix};
use crate::git::{self, BranchSet, GitRunner, RepoHandle};

/// Lowercase a git identity and join its words with dashes
pub fn normalize_user(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// "<repo>-master-<user>", the family prefix for branches cut from the trunk
pub fn root_prefix(repo_dir: &str, user: &str) -> String {
    format!("{}-master-{}", repo_dir, normalize_user(user))
}

/// Highest `n` among branches named exactly `<prefix>-<n>`, or 0
fn max_suffix(prefix: &str, branches: &BranchSet) -> u64 {
    branches
        .iter()
        .filter_map(|b| split_numeric_suffix(b))
        .filter(|(p, _)| *p == prefix)
        .map(|(_, n)| n)
        .max()
        .unwrap_or(0)
}

/// Next free name in a root-derived family
pub fn next_root_name(prefix: &str, branches: &BranchSet) -> String {
    format!("{}-{}", prefix, max_suffix(prefix, branches).saturating_add(1))
}

/// Next link after `base` in its chain.
///
/// "feature-2" becomes "feature-3"; "feature" and "feature-abc" gain a "-1".
/// The suffix is bumped past any existing branch with the same prefix.
pub fn next_chain_name(base: &str, branches: &BranchSet) -> String {
    match split_numeric_suffix(base) {
        Some((prefix, n)) => {
            let next = n.max(max_suffix(prefix, branches)).saturating_add(1);
            format!("{}-{}", prefix, next)
        }
        None => format!("{}-{}", base, max_suffix(base, branches).saturating_add(1)),
    }
}

/// Name of the branch to create after `base`. Never fails: identity or
/// listing problems fall back to `<base>-1`.
pub fn next_name(git: &dyn GitRunner, repo: &RepoHandle, base: &str) -> String {
    if is_root_branch(base) {
        let user = match git::user_name(git, repo.root()) {
            Ok(user) => user,
            Err(e) => {
                log::warn!("No git identity for root branch naming: {:#}", e);
                return format!("{}-1", base);
            }
        };
        return match git::list_branches(git, repo.root()) {
            Ok(branches) => next_root_name(&root_prefix(&repo.dir_name(), &user), &branches),
            Err(e) => {
                log::warn!("Could not list branches for naming: {:#}", e);
                format!("{}-1", base)
            }
        };
    }

    let branches = git::list_branches(git, repo.root()).unwrap_or_else(|e| {
        log::warn!("Could not list branches for naming, using suffix only: {:#}", e);
        BranchSet::new()
    });
    next_chain_name(base, &branches)
}
