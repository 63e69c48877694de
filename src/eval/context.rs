//! # Per-attempt evaluation context.
//!
//! An [`EvalContext`] is created fresh for every attempt. The evaluator fills
//! in `firing`, `no_data_found` and `error`; the supervisor fills in timeouts,
//! cancellation and panics, computes the next state and hands the final
//! context to the result handler.

use std::time::{Duration, SystemTime};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::EvalError;
use crate::schedule::{AlertState, ErrorPolicy, NoDataPolicy, Rule};

/// Transient state of one evaluation attempt.
#[derive(Debug)]
pub struct EvalContext {
    /// Snapshot of the rule being evaluated.
    pub rule: Rule,
    /// Alert condition currently true.
    pub firing: bool,
    /// The query returned no data.
    pub no_data_found: bool,
    /// Evaluation outcome slot.
    pub error: Option<EvalError>,
    /// State before this evaluation.
    pub prev_state: AlertState,

    attempt: u32,
    token: CancellationToken,
    deadline: Instant,
    started: Instant,
    finished: Option<Instant>,
}

impl EvalContext {
    /// Creates a context for `attempt` (1-based) bounded by `timeout`.
    pub fn new(rule: Rule, attempt: u32, token: CancellationToken, timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            prev_state: rule.state,
            rule,
            firing: false,
            no_data_found: false,
            error: None,
            attempt,
            token,
            deadline: started + timeout,
            started,
            finished: None,
        }
    }

    /// Attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Cancellation token of the current phase.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline of the current phase.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Resolves when the current phase is cancelled or its deadline passes.
    pub async fn done(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }

    /// Time spent evaluating; frozen once the attempt finished.
    pub fn elapsed(&self) -> Duration {
        self.finished.unwrap_or_else(Instant::now) - self.started
    }

    pub(crate) fn finish(&mut self) {
        if self.finished.is_none() {
            self.finished = Some(Instant::now());
        }
    }

    /// Moves the context into the result-handling phase.
    pub(crate) fn rebind(&mut self, token: CancellationToken, timeout: Duration) {
        self.token = token;
        self.deadline = Instant::now() + timeout;
    }

    /// Next state for the rule as of now.
    pub fn new_state(&self) -> AlertState {
        self.new_state_at(SystemTime::now())
    }

    /// Next state for the rule as of `now`.
    ///
    /// Errors and no-data results follow the rule's policies; a firing result
    /// passes through `Pending` while the rule has a `for_duration`.
    pub fn new_state_at(&self, now: SystemTime) -> AlertState {
        let state = self.raw_state();
        if state != AlertState::Alerting || self.rule.for_duration.is_zero() {
            return state;
        }

        let since = now
            .duration_since(self.rule.last_state_change)
            .unwrap_or(Duration::ZERO);
        match self.prev_state {
            AlertState::Alerting => AlertState::Alerting,
            AlertState::Pending if since > self.rule.for_duration => AlertState::Alerting,
            _ => AlertState::Pending,
        }
    }

    fn raw_state(&self) -> AlertState {
        if self.error.is_some() {
            return match self.rule.error_policy {
                ErrorPolicy::KeepState => self.prev_state,
                ErrorPolicy::Alerting => AlertState::Alerting,
            };
        }
        if self.firing {
            return AlertState::Alerting;
        }
        if self.no_data_found {
            return match self.rule.no_data_policy {
                NoDataPolicy::NoData => AlertState::NoData,
                NoDataPolicy::Alerting => AlertState::Alerting,
                NoDataPolicy::Ok => AlertState::Ok,
                NoDataPolicy::KeepState => self.prev_state,
            };
        }
        AlertState::Ok
    }
}
