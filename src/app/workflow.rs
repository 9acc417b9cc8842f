use super::gate::ThresholdGate;
use crate::chain;
use crate::git::{self, GitRunner, RepoHandle};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// What the user asked for when proceeding from a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proceed {
    /// Base name for the new chain; required on a root branch, ignored otherwise
    pub branch_name: Option<String>,
    pub files: Vec<String>,
    pub message: String,
}

/// One externally visible step of a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStep {
    Stage(String),
    Commit,
    Push(String),
    CreateBranch(String),
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStep::Stage(path) => write!(f, "stage {}", path),
            WorkflowStep::Commit => write!(f, "commit"),
            WorkflowStep::Push(branch) => write!(f, "push {}", branch),
            WorkflowStep::CreateBranch(branch) => write!(f, "checkout -b {}", branch),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Rejected before any git command ran
    #[error("{0}")]
    Validation(String),

    #[error("repository unavailable: {0:#}")]
    Repository(anyhow::Error),

    /// A git step failed; `completed` lists what already happened
    #[error("{step} failed{}: {source:#}", completed_suffix(.completed))]
    Step {
        step: WorkflowStep,
        completed: Vec<WorkflowStep>,
        #[source]
        source: anyhow::Error,
    },
}

fn completed_suffix(completed: &[WorkflowStep]) -> String {
    if completed.is_empty() {
        return String::new();
    }
    let done: Vec<String> = completed.iter().map(|s| s.to_string()).collect();
    format!(" (already done: {})", done.join(", "))
}

/// Summary of a finished workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub committed_on: String,
    pub pushed: Option<String>,
    pub created: Vec<String>,
}

impl WorkflowReport {
    /// The branch the working tree is on afterwards
    pub fn now_on(&self) -> &str {
        self.created
            .last()
            .map(String::as_str)
            .unwrap_or(&self.committed_on)
    }

    pub fn message(&self) -> String {
        let mut msg = format!("Committed on {}", self.committed_on);
        if let Some(ref pushed) = self.pushed {
            msg.push_str(&format!(", pushed {}", pushed));
        }
        msg.push_str(&format!(", now on {}", self.now_on()));
        msg
    }
}

/// Runs the commit → push → next-branch sequence for one repository.
/// Steps run strictly in order; the first failure stops the sequence and
/// leaves the threshold untouched.
pub struct Workflow<'a> {
    git: &'a dyn GitRunner,
    repo: &'a RepoHandle,
    remote: &'a str,
    completed: Vec<WorkflowStep>,
}

impl<'a> Workflow<'a> {
    pub fn new(git: &'a dyn GitRunner, repo: &'a RepoHandle, remote: &'a str) -> Self {
        Workflow {
            git,
            repo,
            remote,
            completed: Vec::new(),
        }
    }

    /// From the trunk: commit, branch `<name>-1` (pushed with upstream when a
    /// remote exists), then open the next link after it.
    pub fn run_root(
        mut self,
        current: &str,
        request: &Proceed,
        gate: &Mutex<ThresholdGate>,
    ) -> Result<WorkflowReport, WorkflowError> {
        let base = validate_branch_name(request.branch_name.as_deref())?;
        validate_commit(request)?;

        self.stage_and_commit(request)?;
        let remote_exists = self.remote_exists();

        let first = format!("{}-1", base);
        self.create_branch(&first)?;
        let pushed = if remote_exists {
            self.push(&first, true)?;
            Some(first.clone())
        } else {
            None
        };

        let next = chain::next_name(self.git, self.repo, &first);
        self.create_branch(&next)?;

        reset(gate);
        Ok(WorkflowReport {
            committed_on: current.to_string(),
            pushed,
            created: vec![first, next],
        })
    }

    /// Inside a chain: commit, push the current branch, open the next link.
    pub fn run_chain(
        mut self,
        current: &str,
        request: &Proceed,
        gate: &Mutex<ThresholdGate>,
    ) -> Result<WorkflowReport, WorkflowError> {
        validate_commit(request)?;

        self.stage_and_commit(request)?;
        let pushed = if self.remote_exists() {
            self.push(current, false)?;
            Some(current.to_string())
        } else {
            None
        };

        let next = chain::next_name(self.git, self.repo, current);
        self.create_branch(&next)?;

        reset(gate);
        Ok(WorkflowReport {
            committed_on: current.to_string(),
            pushed,
            created: vec![next],
        })
    }

    fn stage_and_commit(&mut self, request: &Proceed) -> Result<(), WorkflowError> {
        let (git, root) = (self.git, self.repo.root());
        for file in &request.files {
            self.step(WorkflowStep::Stage(file.clone()), || git::stage_file(git, root, file))?;
        }
        let message = request.message.trim();
        self.step(WorkflowStep::Commit, || git::commit(git, root, message))
    }

    fn push(&mut self, branch: &str, set_upstream: bool) -> Result<(), WorkflowError> {
        let (git, root, remote) = (self.git, self.repo.root(), self.remote);
        self.step(WorkflowStep::Push(branch.to_string()), || {
            git::push(git, root, remote, branch, set_upstream)
        })
    }

    fn create_branch(&mut self, branch: &str) -> Result<(), WorkflowError> {
        let (git, root) = (self.git, self.repo.root());
        self.step(WorkflowStep::CreateBranch(branch.to_string()), || {
            git::checkout_new_branch(git, root, branch)
        })
    }

    fn remote_exists(&self) -> bool {
        git::has_remote(self.git, self.repo.root(), self.remote).unwrap_or_else(|e| {
            log::warn!("Could not list remotes, skipping push: {:#}", e);
            false
        })
    }

    fn step(
        &mut self,
        step: WorkflowStep,
        run: impl FnOnce() -> anyhow::Result<()>,
    ) -> Result<(), WorkflowError> {
        match run() {
            Ok(()) => {
                log::info!("{}", step);
                self.completed.push(step);
                Ok(())
            }
            Err(source) => {
                log::warn!("{} failed: {:#}", step, source);
                Err(WorkflowError::Step {
                    step,
                    completed: self.completed.clone(),
                    source,
                })
            }
        }
    }
}

fn reset(gate: &Mutex<ThresholdGate>) {
    gate.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .reset_to_original();
}

fn validate_commit(request: &Proceed) -> Result<(), WorkflowError> {
    if request.files.is_empty() {
        return Err(WorkflowError::Validation("No files selected".into()));
    }
    if request.message.trim().is_empty() {
        return Err(WorkflowError::Validation("Commit message is empty".into()));
    }
    Ok(())
}

fn validate_branch_name(name: Option<&str>) -> Result<&str, WorkflowError> {
    let name = name.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(WorkflowError::Validation("Branch name is empty".into()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(WorkflowError::Validation(format!(
            "Branch name '{}' contains whitespace",
            name
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeGit;
    use std::time::Duration;
    use tempfile::TempDir;

    fn handle(dir: &TempDir, git: &FakeGit) -> RepoHandle {
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        git.set("rev-parse --show-toplevel", &dir.path().to_string_lossy());
        RepoHandle::resolve(git, dir.path()).unwrap()
    }

    fn raised_gate() -> Mutex<ThresholdGate> {
        let mut gate = ThresholdGate::new(5, Duration::from_secs(10));
        gate.increase_threshold(50, 10);
        Mutex::new(gate)
    }

    fn request(branch: Option<&str>) -> Proceed {
        Proceed {
            branch_name: branch.map(String::from),
            files: vec!["src/a.rs".into(), "src/b.rs".into()],
            message: "Add auth flow".into(),
        }
    }

    fn mutating_calls(git: &FakeGit) -> Vec<String> {
        git.calls()
            .into_iter()
            .filter(|c| {
                ["add ", "commit ", "push ", "checkout "]
                    .iter()
                    .any(|p| c.starts_with(p))
            })
            .collect()
    }

    #[test]
    fn root_workflow_with_remote() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new().on("remote -v", "origin\tgit@host:r.git (push)\n");
        let repo = handle(&dir, &git);
        let gate = raised_gate();

        let report = Workflow::new(&git, &repo, "origin")
            .run_root("master", &request(Some("auth")), &gate)
            .unwrap();

        assert_eq!(
            mutating_calls(&git),
            vec![
                "add -- src/a.rs",
                "add -- src/b.rs",
                "commit -m Add auth flow",
                "checkout -b auth-1",
                "push -u origin auth-1",
                "checkout -b auth-2",
            ]
        );
        assert_eq!(report.now_on(), "auth-2");
        assert_eq!(report.pushed.as_deref(), Some("auth-1"));
        assert_eq!(gate.lock().unwrap().current(), 5);
    }

    #[test]
    fn root_workflow_without_remote_skips_push() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new();
        let repo = handle(&dir, &git);
        let gate = raised_gate();

        let report = Workflow::new(&git, &repo, "origin")
            .run_root("main", &request(Some(" auth ")), &gate)
            .unwrap();

        assert!(!mutating_calls(&git).iter().any(|c| c.starts_with("push")));
        assert_eq!(report.created, vec!["auth-1", "auth-2"]);
        assert!(report.message().contains("now on auth-2"));
    }

    #[test]
    fn chain_workflow_pushes_current_without_upstream_flag() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new()
            .on("remote -v", "origin\tgit@host:r.git (fetch)\n")
            .on("branch -a", "* feature-1\n  feature\n  remotes/origin/feature-1\n");
        let repo = handle(&dir, &git);
        let gate = raised_gate();

        let report = Workflow::new(&git, &repo, "origin")
            .run_chain("feature-1", &request(None), &gate)
            .unwrap();

        let calls = mutating_calls(&git);
        assert!(calls.contains(&"push origin feature-1".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("checkout -b feature-2"));
        assert_eq!(report.now_on(), "feature-2");
        assert_eq!(gate.lock().unwrap().current(), 5);
    }

    #[test]
    fn validation_runs_before_any_git_command() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new();
        let repo = handle(&dir, &git);
        let gate = raised_gate();

        let mut no_files = request(Some("auth"));
        no_files.files.clear();
        let mut blank_message = request(None);
        blank_message.message = "   ".into();

        for (current, req) in [
            ("master", request(None)),
            ("master", request(Some("  "))),
            ("master", request(Some("my branch"))),
            ("master", no_files),
        ] {
            let err = Workflow::new(&git, &repo, "origin")
                .run_root(current, &req, &gate)
                .unwrap_err();
            assert!(matches!(err, WorkflowError::Validation(_)), "{err}");
        }
        let err = Workflow::new(&git, &repo, "origin")
            .run_chain("feature-1", &blank_message, &gate)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        assert!(mutating_calls(&git).is_empty());
        assert_eq!(gate.lock().unwrap().current(), 60);
    }

    #[test]
    fn failed_push_aborts_and_keeps_threshold() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new()
            .on("remote -v", "origin\tgit@host:r.git (push)\n")
            .failing("push origin feature-1", "rejected: non-fast-forward");
        let repo = handle(&dir, &git);
        let gate = raised_gate();

        let err = Workflow::new(&git, &repo, "origin")
            .run_chain("feature-1", &request(None), &gate)
            .unwrap_err();

        let text = err.to_string();
        assert!(text.starts_with("push feature-1 failed"), "{text}");
        assert!(text.contains("already done: stage src/a.rs, stage src/b.rs, commit"));
        assert!(text.contains("non-fast-forward"));
        assert!(!git.calls().iter().any(|c| c.starts_with("checkout")));
        assert_eq!(gate.lock().unwrap().current(), 60);
    }

    #[test]
    fn failed_stage_reports_first_step() {
        let dir = TempDir::new().unwrap();
        let git = FakeGit::new().failing("add -- src/a.rs", "pathspec did not match");
        let repo = handle(&dir, &git);
        let gate = raised_gate();

        let err = Workflow::new(&git, &repo, "origin")
            .run_chain("feature-1", &request(None), &gate)
            .unwrap_err();
        match err {
            WorkflowError::Step { step, completed, .. } => {
                assert_eq!(step, WorkflowStep::Stage("src/a.rs".into()));
                assert!(completed.is_empty());
            }
            other => panic!("unexpected {other}"),
        }
    }

    // ── real git ──

    fn git_in(dir: &std::path::Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {:?} failed", args);
    }

    #[test]
    fn root_workflow_against_bare_remote() {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote.git");
        let work = dir.path().join("work");
        std::fs::create_dir_all(&remote).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        git_in(&remote, &["init", "-q", "--bare"]);
        git_in(&work, &["init", "-q"]);
        git_in(&work, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        git_in(&work, &["config", "user.name", "Ada Lovelace"]);
        git_in(&work, &["config", "user.email", "ada@example.com"]);
        git_in(&work, &["config", "commit.gpgsign", "false"]);
        std::fs::write(work.join("a.txt"), "one\n").unwrap();
        git_in(&work, &["add", "a.txt"]);
        git_in(&work, &["commit", "-q", "-m", "init"]);
        git_in(&work, &["remote", "add", "origin", &remote.to_string_lossy()]);

        std::fs::write(work.join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let repo = RepoHandle::resolve(&crate::git::SystemGit, &work).unwrap();
        assert_eq!(
            chain::compute_total(&crate::git::SystemGit, repo.root()).total,
            2
        );

        let gate = raised_gate();
        let report = Workflow::new(&crate::git::SystemGit, &repo, "origin")
            .run_root(
                "master",
                &Proceed {
                    branch_name: Some("auth".into()),
                    files: vec!["a.txt".into()],
                    message: "Split auth".into(),
                },
                &gate,
            )
            .unwrap();

        assert_eq!(report.created, vec!["auth-1", "auth-2"]);
        assert_eq!(report.pushed.as_deref(), Some("auth-1"));
        assert_eq!(
            git::current_branch(&crate::git::SystemGit, repo.root()).unwrap(),
            "auth-2"
        );
        let remote_branches = crate::git::SystemGit.run(&remote, &["branch"]).unwrap();
        assert!(remote_branches.contains("auth-1"));
        assert_eq!(
            chain::compute_total(&crate::git::SystemGit, repo.root()).total,
            0
        );
        assert_eq!(gate.lock().unwrap().current(), 5);
    }
}
