//! # Job: one rule's scheduling slot.
//!
//! The scheduler keeps one [`Job`] per rule across refreshes and hands out
//! `Arc<Job>` clones to the dispatcher. The `running` flag is the only state
//! shared across tasks while a job executes; the rule snapshot behind a lock
//! is swapped on catalog refresh and its state is written after evaluation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::schedule::rule::{AlertState, Rule};

/// Scheduling unit wrapping one rule.
#[derive(Debug)]
pub struct Job {
    rule_id: i64,
    rule: RwLock<Rule>,
    running: AtomicBool,
}

impl Job {
    /// Creates an idle job for `rule`.
    pub fn new(rule: Rule) -> Self {
        Self {
            rule_id: rule.id,
            rule: RwLock::new(rule),
            running: AtomicBool::new(false),
        }
    }

    /// Identifier of the wrapped rule.
    pub fn rule_id(&self) -> i64 {
        self.rule_id
    }

    /// Snapshot of the wrapped rule.
    pub fn rule(&self) -> Rule {
        self.rule.read().clone()
    }

    /// Name of the wrapped rule.
    pub fn rule_name(&self) -> String {
        self.rule.read().name.clone()
    }

    /// True while an attempt supervisor owns this job.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Replaces the rule definition (catalog refresh).
    pub(crate) fn replace_rule(&self, rule: Rule) {
        *self.rule.write() = rule;
    }

    /// Writes an evaluated state back; `last_state_change` moves only on change.
    pub(crate) fn record_state(&self, state: AlertState, at: SystemTime) {
        let mut rule = self.rule.write();
        if rule.state != state {
            rule.state = state;
            rule.last_state_change = at;
        }
    }
}
