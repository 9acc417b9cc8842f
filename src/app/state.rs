use super::gate::{Decision, ThresholdGate};
use super::workflow::{Proceed, Workflow, WorkflowError, WorkflowReport};
use crate::chain::{self, ChangeMetric};
use crate::config::ChainerConfig;
use crate::git::{self, GitRunner, RepoHandle};
use crate::prompt::{Prompt, PromptRequest, PromptResponse};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of an edit-triggered check
#[derive(Debug)]
pub enum Check {
    /// A prompt or workflow is already running; this check was dropped
    Busy,
    Skipped(Decision),
    /// Over threshold: present the request, then answer with the ticket
    Show(PromptRequest, PromptTicket),
}

/// Proof that this caller owns the single outstanding prompt.
/// Dropping it, answered or not, lets the next check through.
#[derive(Debug)]
pub struct PromptTicket {
    flag: Arc<AtomicBool>,
}

impl Drop for PromptTicket {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Threshold tuning for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub threshold: u64,
    pub increment: u64,
    pub cooldown: Duration,
    pub remote: String,
}

impl From<&ChainerConfig> for SessionSettings {
    fn from(config: &ChainerConfig) -> Self {
        SessionSettings {
            threshold: config.threshold.lines,
            increment: config.threshold.increment,
            cooldown: Duration::from_secs(config.threshold.cooldown_secs),
            remote: config.git.remote.clone(),
        }
    }
}

/// One editing session over one repository: owns the threshold gate and the
/// in-flight prompt guard, and is the entry point for the trigger and prompt.
pub struct Session<G: GitRunner> {
    git: G,
    dir: PathBuf,
    gate: Mutex<ThresholdGate>,
    in_flight: Arc<AtomicBool>,
    increment: u64,
    remote: String,
}

impl<G: GitRunner> Session<G> {
    pub fn new(git: G, dir: &Path, settings: SessionSettings) -> Self {
        Session {
            git,
            dir: dir.to_path_buf(),
            gate: Mutex::new(ThresholdGate::new(settings.threshold, settings.cooldown)),
            in_flight: Arc::new(AtomicBool::new(false)),
            increment: settings.increment,
            remote: settings.remote,
        }
    }

    fn gate(&self) -> MutexGuard<'_, ThresholdGate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn repo(&self) -> Result<RepoHandle> {
        RepoHandle::resolve(&self.git, &self.dir)
    }

    pub fn current_threshold(&self) -> u64 {
        self.gate().current()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Measure and decide without claiming the prompt
    pub fn preview(&self) -> Result<(ChangeMetric, Decision)> {
        let repo = self.repo()?;
        let metric = chain::compute_total(&self.git, repo.root());
        let decision = self.gate().decide(metric.clone(), Instant::now());
        Ok((metric, decision))
    }

    /// Entry point for the edit trigger
    pub fn on_possible_change(&self) -> Result<Check> {
        if self.is_busy() {
            log::debug!("Prompt in flight, skipping check");
            return Ok(Check::Busy);
        }

        let repo = self.repo()?;
        let metric = chain::compute_total(&self.git, repo.root());
        let decision = self.gate().decide(metric, Instant::now());

        let (metric, threshold) = match decision {
            Decision::Show { metric, threshold } => (metric, threshold),
            Decision::SkipCooldown(remaining) => {
                log::debug!("Over threshold, cooling down for {}s", remaining.as_secs());
                return Ok(Check::Skipped(Decision::SkipCooldown(remaining)));
            }
            other => return Ok(Check::Skipped(other)),
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(Check::Busy);
        }
        let ticket = PromptTicket {
            flag: Arc::clone(&self.in_flight),
        };

        let suggested_branch = if chain::is_root_branch(&metric.branch) {
            suggest_root_base(&chain::next_name(&self.git, &repo, &metric.branch))
        } else {
            None
        };
        log::info!(
            "{} changed lines on {} (threshold {})",
            metric.total,
            metric.branch,
            threshold
        );

        let request = PromptRequest {
            changed_files: git::changed_files(&self.git, repo.root()),
            metric,
            threshold,
            suggested_branch,
        };
        Ok(Check::Show(request, ticket))
    }

    /// Raise the threshold past the changes as they stand now
    pub fn on_user_increase_threshold(&self, ticket: PromptTicket) {
        let total = self.fresh_total();
        let mut gate = self.gate();
        gate.increase_threshold(total, self.increment);
        log::info!("Threshold raised to {}", gate.current());
        drop(ticket);
    }

    /// Raise the threshold and suppress prompts for the cooldown window
    pub fn on_user_cancel(&self, ticket: PromptTicket) {
        let total = self.fresh_total();
        let mut gate = self.gate();
        gate.cancel(total, self.increment, Instant::now());
        log::info!(
            "Cancelled; threshold now {}, quiet for {}s",
            gate.current(),
            gate.state().cooldown.as_secs()
        );
        drop(ticket);
    }

    /// Run the workflow matching the current branch
    pub fn on_user_proceed(
        &self,
        ticket: PromptTicket,
        request: Proceed,
    ) -> std::result::Result<WorkflowReport, WorkflowError> {
        let repo = self.repo().map_err(WorkflowError::Repository)?;
        let current =
            git::current_branch(&self.git, repo.root()).map_err(WorkflowError::Repository)?;
        if current.is_empty() {
            return Err(WorkflowError::Repository(anyhow::anyhow!(
                "HEAD is detached; check out a branch first"
            )));
        }

        let workflow = Workflow::new(&self.git, &repo, &self.remote);
        let outcome = if chain::is_root_branch(&current) {
            workflow.run_root(&current, &request, &self.gate)
        } else {
            workflow.run_chain(&current, &request, &self.gate)
        };

        match &outcome {
            Ok(report) => log::info!("{}", report.message()),
            Err(e) => log::warn!("Workflow stopped: {}", e),
        }
        drop(ticket);
        outcome
    }

    /// Present a Show decision through `prompt` and apply the answer
    pub fn handle_prompt(
        &self,
        request: PromptRequest,
        ticket: PromptTicket,
        prompt: &mut dyn Prompt,
    ) -> Result<()> {
        match prompt.ask(&request)? {
            PromptResponse::IncreaseThreshold => self.on_user_increase_threshold(ticket),
            PromptResponse::Cancel => self.on_user_cancel(ticket),
            PromptResponse::Proceed(proceed) => {
                let outcome = self.on_user_proceed(ticket, proceed);
                prompt.report(&outcome);
            }
        }
        Ok(())
    }

    /// Re-measured total at the moment of a user response; 0 if unmeasurable
    fn fresh_total(&self) -> u64 {
        match self.repo() {
            Ok(repo) => chain::compute_total(&self.git, repo.root()).total,
            Err(e) => {
                log::warn!("Could not re-measure changes: {:#}", e);
                0
            }
        }
    }
}

/// Offer the family prefix when starting a new family, so the workflow's
/// `<name>-1` lands on the first free slot; otherwise offer the free name itself.
/// No suggestion when naming fell back to the trunk itself.
fn suggest_root_base(next_root: &str) -> Option<String> {
    let base = match chain::split_numeric_suffix(next_root) {
        Some((prefix, 1)) => prefix,
        _ => next_root,
    };
    if chain::is_root_branch(base) {
        None
    } else {
        Some(base.to_string())
    }
}
