//! # Rule scheduler.
//!
//! Holds one [`Job`] per rule and decides, per tick, which of them are due.
//!
//! ## Staggering
//! Rules sharing a frequency would otherwise all fire on the same second. On
//! [`Scheduler::update`] rule `i` of `n` gets an offset inside its frequency
//! window:
//!
//! ```text
//! offset = floor(frequency_secs * i / n)     (0 → 1)
//!
//! tick(now):
//!   running or paused              → skip
//!   waiting and now % offset == 0  → enqueue, stop waiting
//!   now % frequency_secs == 0      → start waiting on the offset
//! ```
//!
//! Offsets are at least one second, so a rule that becomes due is enqueued on
//! a later tick, never on the tick that made it due.
//!
//! ## Rules
//! - `update` replaces the whole job map; nothing observes a half-applied set.
//! - Jobs keep their identity and pending offset across updates, so a running
//!   job stays marked running after a refresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::schedule::{Job, JobQueue, PushOutcome};
use crate::schedule::rule::{AlertState, Rule};
use crate::schedule::ticker::Tick;

#[derive(Debug)]
struct Slot {
    job: Arc<Job>,
    offset: u64,
    offset_wait: bool,
}

/// Due-rule computation over the current rule set.
#[derive(Debug, Default)]
pub struct Scheduler {
    slots: BTreeMap<i64, Slot>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rule set.
    pub fn update(&mut self, rules: Vec<Rule>) {
        let n = rules.len() as u64;
        let mut next = BTreeMap::new();

        for (i, rule) in rules.into_iter().enumerate() {
            let freq = rule.frequency_secs();
            let offset = ((freq * 1000 / n) * i as u64 / 1000).max(1);

            let (job, offset_wait) = match self.slots.remove(&rule.id) {
                Some(slot) => {
                    slot.job.replace_rule(rule);
                    (slot.job, slot.offset_wait)
                }
                None => (Arc::new(Job::new(rule)), false),
            };
            next.insert(
                job.rule_id(),
                Slot {
                    job,
                    offset,
                    offset_wait,
                },
            );
        }

        tracing::debug!(rules = next.len(), "scheduler: updating alert rules");
        self.slots = next;
    }

    /// Jobs to enqueue for `tick`, advancing the offset bookkeeping.
    pub fn due(&mut self, tick: &Tick) -> Vec<Arc<Job>> {
        let now = tick.unix_secs();
        let mut due = Vec::new();

        for slot in self.slots.values_mut() {
            if slot.job.is_running() {
                continue;
            }
            let rule = slot.job.rule();
            if rule.state == AlertState::Paused {
                continue;
            }

            if slot.offset_wait && now % slot.offset == 0 {
                slot.offset_wait = false;
                due.push(Arc::clone(&slot.job));
                continue;
            }
            if now % rule.frequency_secs() == 0 {
                slot.offset_wait = true;
            }
        }
        due
    }

    /// Pushes every due job onto `queue`; returns how many were queued.
    ///
    /// All pushes of one tick share a single `enqueue_timeout` deadline, so a
    /// full queue stalls the tick loop for at most that long; jobs left after
    /// the deadline are dropped unless a slot is free right away.
    pub async fn tick(&mut self, tick: &Tick, queue: &JobQueue) -> Result<usize, EngineError> {
        let deadline = queue.deadline();
        let mut queued = 0;
        for job in self.due(tick) {
            match queue.push_before(job, deadline).await {
                PushOutcome::Queued => queued += 1,
                PushOutcome::Dropped => {}
                PushOutcome::Closed => return Err(EngineError::QueueClosed),
            }
        }
        Ok(queued)
    }

    /// Number of scheduled rules.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no rules are scheduled.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[cfg(test)]
    fn offset_of(&self, rule_id: i64) -> Option<u64> {
        self.slots.get(&rule_id).map(|s| s.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Bus;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn rule(id: i64, secs: u64) -> Rule {
        Rule::new(id, 1, format!("rule-{id}"), Duration::from_secs(secs))
    }

    fn ids(jobs: &[Arc<Job>]) -> Vec<i64> {
        jobs.iter().map(|j| j.rule_id()).collect()
    }

    #[test]
    fn test_offsets_stagger_rules() {
        let mut s = Scheduler::new();
        s.update(vec![rule(1, 60), rule(2, 60), rule(3, 60), rule(4, 1)]);

        assert_eq!(s.offset_of(1), Some(1));
        assert_eq!(s.offset_of(2), Some(15));
        assert_eq!(s.offset_of(3), Some(30));
        assert_eq!(s.offset_of(4), Some(1));
    }

    #[test]
    fn test_due_waits_for_offset() {
        let mut s = Scheduler::new();
        s.update(vec![rule(1, 10), rule(2, 10)]);
        // rule 1: offset 1, rule 2: offset 5

        assert!(s.due(&Tick::from_unix_secs(1000)).is_empty());
        assert_eq!(ids(&s.due(&Tick::from_unix_secs(1001))), vec![1]);
        assert!(s.due(&Tick::from_unix_secs(1002)).is_empty());
        assert_eq!(ids(&s.due(&Tick::from_unix_secs(1005))), vec![2]);
        assert!(s.due(&Tick::from_unix_secs(1006)).is_empty());
    }

    #[test]
    fn test_running_and_paused_jobs_are_skipped() {
        let mut s = Scheduler::new();
        s.update(vec![rule(1, 1), rule(2, 1).with_state(AlertState::Paused)]);

        let first = s.due(&Tick::from_unix_secs(10));
        assert!(first.is_empty());
        let jobs = s.due(&Tick::from_unix_secs(11));
        assert_eq!(ids(&jobs), vec![1]);

        jobs[0].set_running(true);
        s.due(&Tick::from_unix_secs(12));
        assert!(s.due(&Tick::from_unix_secs(13)).is_empty());
    }

    #[test]
    fn test_update_keeps_job_identity() {
        let mut s = Scheduler::new();
        s.update(vec![rule(1, 1)]);
        s.due(&Tick::from_unix_secs(10));
        let job = s.due(&Tick::from_unix_secs(11)).remove(0);
        job.set_running(true);

        s.update(vec![rule(1, 1), rule(2, 1)]);
        assert_eq!(s.len(), 2);
        s.due(&Tick::from_unix_secs(12));
        assert_eq!(ids(&s.due(&Tick::from_unix_secs(13))), vec![2]);

        s.update(vec![rule(2, 1)]);
        assert_eq!(s.len(), 1);
    }

    #[tokio::test]
    async fn test_tick_pushes_due_jobs() {
        let (queue, mut rx) = JobQueue::channel(
            8,
            Duration::from_secs(1),
            Bus::new(16),
            CancellationToken::new(),
        );
        let mut s = Scheduler::new();
        s.update(vec![rule(7, 1)]);

        assert_eq!(s.tick(&Tick::from_unix_secs(20), &queue).await.expect("tick"), 0);
        assert_eq!(s.tick(&Tick::from_unix_secs(21), &queue).await.expect("tick"), 1);
        assert_eq!(rx.recv().await.expect("job").rule_id(), 7);

        drop(rx);
        s.tick(&Tick::from_unix_secs(22), &queue).await.expect("tick");
        let err = s.tick(&Tick::from_unix_secs(23), &queue).await;
        assert!(matches!(err, Err(EngineError::QueueClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_blocks_a_tick_for_one_timeout_at_most() {
        let (queue, _rx) = JobQueue::channel(
            1,
            Duration::from_secs(1),
            Bus::new(64),
            CancellationToken::new(),
        );
        let mut s = Scheduler::new();
        s.update((1..=6).map(|id| rule(id, 1)).collect());
        s.tick(&Tick::from_unix_secs(30), &queue).await.expect("tick");

        let started = tokio::time::Instant::now();
        let queued = s.tick(&Tick::from_unix_secs(31), &queue).await.expect("tick");
        let blocked = started.elapsed();

        assert_eq!(queued, 1);
        assert!(blocked >= Duration::from_secs(1));
        assert!(blocked < Duration::from_secs(2));
    }
}
