mod diff;
#[cfg(test)]
pub mod fake;
mod runner;
mod status;

#[allow(unused_imports)]
pub use diff::{
    changed_files, compute_changed_lines, parse_numstat, parse_numstat_line, sum_changed_lines,
    DiffLineStat,
};
#[allow(unused_imports)]
pub use runner::{GitRunner, SystemGit};
#[allow(unused_imports)]
pub use status::{
    checkout_new_branch, commit, current_branch, has_remote, list_branches, parse_branch_list,
    push, stage_file, user_name, BranchSet, RepoHandle,
};
