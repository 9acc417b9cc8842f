use crate::git::{self, BranchSet, GitRunner};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Trunk names that never have a parent
pub const ROOT_BRANCHES: [&str; 2] = ["master", "main"];

/// Parent used whenever a chain link cannot be confirmed
pub const FALLBACK_PARENT: &str = "master";

/// What the current branch is measured against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRef {
    /// Working tree against HEAD only
    Root,
    Named(String),
}

impl ParentRef {
    fn named(name: &str) -> Self {
        ParentRef::Named(name.to_string())
    }

    /// Three-dot range isolating commits made since diverging from the parent
    pub fn merge_base_range(&self) -> Option<String> {
        match self {
            ParentRef::Root => None,
            ParentRef::Named(parent) => Some(format!("{}...HEAD", parent)),
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Root => write!(f, "HEAD (working tree)"),
            ParentRef::Named(name) => write!(f, "{}", name),
        }
    }
}

pub fn is_root_branch(name: &str) -> bool {
    ROOT_BRANCHES.contains(&name)
}

/// Split "feature-x-12" into ("feature-x", 12).
/// Only the last dash-delimited token is considered, and it must be all digits.
pub fn split_numeric_suffix(name: &str) -> Option<(&str, u64)> {
    let (prefix, suffix) = name.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = suffix.parse().ok()?;
    Some((prefix, n))
}

/// Infer the parent of `current` from naming conventions alone.
///
/// Rules, first match wins:
/// 1. `master` / `main` are roots.
/// 2. `<x>-master-1` descends from `master`.
/// 3. `<x>-master-<n>` descends from `<x>-master-<n-1>` when it exists.
/// 4. `<x>-1` descends from `<x>` when it exists.
/// 5. `<x>-<n>` descends from `<x>-<n-1>` when it exists.
/// 6. Anything else descends from `master`, then `main`, else is treated as a root.
///
/// Unconfirmed candidates in rules 3-5 fall back to `master`.
pub fn resolve_parent_from(current: &str, branches: &BranchSet) -> ParentRef {
    if is_root_branch(current) {
        return ParentRef::Root;
    }

    if let Some((prefix, n)) = split_numeric_suffix(current) {
        let root_derived = prefix
            .strip_suffix("-master")
            .map_or(false, |x| !x.is_empty());

        if root_derived {
            if n == 1 {
                return ParentRef::named(FALLBACK_PARENT);
            }
            if n > 1 {
                return previous_or_fallback(prefix, n, branches);
            }
        } else if n == 1 && !prefix.contains("-master-") {
            if branches.contains(prefix) {
                return ParentRef::named(prefix);
            }
            return ParentRef::named(FALLBACK_PARENT);
        } else if n > 1 {
            return previous_or_fallback(prefix, n, branches);
        }
    }

    ROOT_BRANCHES
        .iter()
        .find(|root| branches.contains(**root))
        .map(|root| ParentRef::named(root))
        .unwrap_or(ParentRef::Root)
}

fn previous_or_fallback(prefix: &str, n: u64, branches: &BranchSet) -> ParentRef {
    let candidate = format!("{}-{}", prefix, n - 1);
    if branches.contains(&candidate) {
        ParentRef::Named(candidate)
    } else {
        ParentRef::named(FALLBACK_PARENT)
    }
}

/// Resolve the parent of `current` against the repository's branches.
/// A failed branch listing resolves to `master`.
pub fn resolve_parent(git: &dyn GitRunner, repo: &Path, current: &str) -> ParentRef {
    if is_root_branch(current) {
        return ParentRef::Root;
    }

    match git::list_branches(git, repo) {
        Ok(branches) => resolve_parent_from(current, &branches),
        Err(e) => {
            log::warn!(
                "Could not list branches to resolve parent of {}, assuming {}: {:#}",
                current,
                FALLBACK_PARENT,
                e
            );
            ParentRef::named(FALLBACK_PARENT)
        }
    }
}
