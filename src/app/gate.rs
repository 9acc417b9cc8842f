use crate::chain::ChangeMetric;
use std::time::{Duration, Instant};

/// Threshold and cooldown for one repository session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdState {
    /// Never below `original`
    pub current: u64,
    pub original: u64,
    pub last_cancel_at: Option<Instant>,
    pub cooldown: Duration,
}

/// Outcome of one threshold check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Show { metric: ChangeMetric, threshold: u64 },
    SkipBelowThreshold,
    /// Over threshold, but a recent cancel suppresses the prompt for this long
    SkipCooldown(Duration),
}

/// Decides whether accumulated changes warrant a prompt.
///
/// The gate does not track whether a prompt is currently open; the session
/// holding it guards that.
#[derive(Debug, Clone)]
pub struct ThresholdGate {
    state: ThresholdState,
}

impl ThresholdGate {
    pub fn new(threshold: u64, cooldown: Duration) -> Self {
        ThresholdGate {
            state: ThresholdState {
                current: threshold,
                original: threshold,
                last_cancel_at: None,
                cooldown,
            },
        }
    }

    pub fn state(&self) -> &ThresholdState {
        &self.state
    }

    pub fn current(&self) -> u64 {
        self.state.current
    }

    pub fn decide(&self, metric: ChangeMetric, now: Instant) -> Decision {
        if metric.total < self.state.current {
            return Decision::SkipBelowThreshold;
        }

        if let Some(remaining) = self.cooldown_remaining(now) {
            return Decision::SkipCooldown(remaining);
        }

        Decision::Show {
            metric,
            threshold: self.state.current,
        }
    }

    /// Time left in the cooldown window, inclusive of its last instant
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let cancelled_at = self.state.last_cancel_at?;
        let elapsed = now.saturating_duration_since(cancelled_at);
        if elapsed <= self.state.cooldown {
            Some(self.state.cooldown - elapsed)
        } else {
            None
        }
    }

    /// Move the threshold to `extra` lines beyond a freshly measured total.
    /// The threshold only ever rises here.
    pub fn increase_threshold(&mut self, fresh_total: u64, extra: u64) {
        let raised = fresh_total.saturating_add(extra);
        self.state.current = self.state.current.max(raised);
    }

    /// Start the cooldown and raise the threshold
    pub fn cancel(&mut self, fresh_total: u64, extra: u64, now: Instant) {
        self.state.last_cancel_at = Some(now);
        self.increase_threshold(fresh_total, extra);
    }

    /// Called only after a workflow completes
    pub fn reset_to_original(&mut self) {
        self.state.current = self.state.original;
    }
}
