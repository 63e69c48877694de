//! # Execution queue between the tick loop and the dispatcher.
//!
//! [`JobQueue`] is the producer half of a bounded `mpsc` channel. Pushing
//! prefers not to block the tick loop:
//!
//! ```text
//! push(job)
//!   ├─ try_send ok             → Queued
//!   ├─ full → reserve() until the deadline
//!   │          ├─ slot freed   → Queued
//!   │          ├─ deadline     → Dropped (warn + JobDropped event)
//!   │          └─ shutdown     → Dropped
//!   └─ receiver gone           → Closed
//! ```
//!
//! [`JobQueue::push`] gives each job its own `enqueue_timeout`. The scheduler
//! instead shares one [`JobQueue::deadline`] across all jobs of a tick via
//! [`JobQueue::push_before`], so a tick blocks for at most one
//! `enqueue_timeout` however many jobs are due; once the deadline has passed
//! the remaining pushes only try a non-blocking send.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::schedule::job::Job;

/// Result of [`JobQueue::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The job is on the queue.
    Queued,
    /// The queue stayed full (or shutdown started) and the job was discarded.
    Dropped,
    /// The dispatcher is gone.
    Closed,
}

/// Producer side of the execution queue.
#[derive(Clone, Debug)]
pub struct JobQueue {
    tx: mpsc::Sender<Arc<Job>>,
    enqueue_timeout: Duration,
    bus: Bus,
    shutdown: CancellationToken,
}

impl JobQueue {
    /// Creates a queue of `capacity` (clamped to at least 1) and its receiver.
    pub fn channel(
        capacity: usize,
        enqueue_timeout: Duration,
        bus: Bus,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::Receiver<Arc<Job>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                enqueue_timeout,
                bus,
                shutdown,
            },
            rx,
        )
    }

    /// Deadline for a batch of pushes starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.enqueue_timeout
    }

    /// Pushes a job, blocking at most `enqueue_timeout` on a full queue.
    pub async fn push(&self, job: Arc<Job>) -> PushOutcome {
        self.push_before(job, self.deadline()).await
    }

    /// Pushes a job, blocking on a full queue no later than `deadline`.
    ///
    /// With a deadline already in the past this only tries a non-blocking send.
    pub async fn push_before(&self, job: Arc<Job>, deadline: Instant) -> PushOutcome {
        let rule_id = job.rule_id();
        let rule = job.rule_name();

        let job = match self.tx.try_send(job) {
            Ok(()) => return self.queued(rule_id, rule),
            Err(mpsc::error::TrySendError::Closed(_)) => return PushOutcome::Closed,
            Err(mpsc::error::TrySendError::Full(job)) => job,
        };

        let reserved = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            res = tokio::time::timeout_at(deadline, self.tx.reserve()) => Some(res),
        };

        match reserved {
            Some(Ok(Ok(permit))) => {
                permit.send(job);
                self.queued(rule_id, rule)
            }
            Some(Ok(Err(_closed))) => PushOutcome::Closed,
            Some(Err(_elapsed)) => {
                tracing::warn!(
                    rule_id,
                    %rule,
                    timeout = ?self.enqueue_timeout,
                    "execution queue full: dropping job"
                );
                self.bus.publish(
                    Event::new(EventKind::JobDropped)
                        .with_rule(rule_id, rule)
                        .with_timeout(self.enqueue_timeout)
                        .with_reason("queue full"),
                );
                PushOutcome::Dropped
            }
            None => PushOutcome::Dropped,
        }
    }

    fn queued(&self, rule_id: i64, rule: String) -> PushOutcome {
        tracing::debug!(rule_id, %rule, "putting job on exec queue");
        self.bus
            .publish(Event::new(EventKind::JobQueued).with_rule(rule_id, rule));
        PushOutcome::Queued
    }
}
