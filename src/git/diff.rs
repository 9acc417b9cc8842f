use super::GitRunner;
use std::path::Path;

/// One line of `git diff --numstat` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLineStat {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
}

impl DiffLineStat {
    pub fn changed(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }
}

// ── Parsing ──

/// Parse a numstat line like "12\t3\tsrc/main.rs".
/// Returns None for lines with fewer than three tab-separated fields.
/// Non-numeric counts (binary files report "-") are read as 0.
pub fn parse_numstat_line(line: &str) -> Option<DiffLineStat> {
    let mut fields = line.splitn(3, '\t');
    let additions = fields.next()?;
    let deletions = fields.next()?;
    let path = fields.next()?;

    Some(DiffLineStat {
        path: path.to_string(),
        additions: additions.trim().parse().unwrap_or(0),
        deletions: deletions.trim().parse().unwrap_or(0),
    })
}

/// Parse full numstat output, skipping blank and malformed lines
pub fn parse_numstat(raw: &str) -> Vec<DiffLineStat> {
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(parse_numstat_line)
        .collect()
}

/// Sum additions + deletions over every well-formed numstat line
pub fn sum_changed_lines(raw: &str) -> u64 {
    parse_numstat(raw)
        .iter()
        .fold(0u64, |acc, stat| acc.saturating_add(stat.changed()))
}

// ── Git ──

/// Changed line count for `git diff <base_ref> --numstat`.
///
/// `base_ref` is "HEAD" for working-tree changes or "<parent>...HEAD" for
/// changes since the merge-base with a parent branch. Any git failure is
/// logged and counted as zero changes.
pub fn compute_changed_lines(git: &dyn GitRunner, repo: &Path, base_ref: &str) -> u64 {
    match git.run(repo, &["diff", base_ref, "--numstat"]) {
        Ok(raw) => sum_changed_lines(&raw),
        Err(e) => {
            log::warn!("Could not measure changes against {}: {:#}", base_ref, e);
            0
        }
    }
}

/// Paths with working-tree changes against HEAD, for commit file selection
pub fn changed_files(git: &dyn GitRunner, repo: &Path) -> Vec<String> {
    match git.run(repo, &["diff", "HEAD", "--name-only"]) {
        Ok(raw) => raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Err(e) => {
            log::warn!("Could not list changed files: {:#}", e);
            Vec::new()
        }
    }
}
