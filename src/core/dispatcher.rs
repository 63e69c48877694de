//! # Job dispatcher.
//!
//! Drains the execution queue and starts one [`AttemptSupervisor`] per job
//! without waiting for it.
//!
//! ```text
//! loop {
//!   shutdown          → stop receiving
//!   finished job      → reap its report
//!   job from queue    → JoinSet::spawn(supervisor.run(job))
//! }
//! drain: wait for every supervisor started here (each bounded by `grace`)
//! ```
//!
//! ## Rules
//! - No retry or timeout logic lives here.
//! - A supervisor that panics is logged and reaped; the dispatcher keeps going.
//! - The queue closing before shutdown is an engine failure ([`EngineError::QueueClosed`]).

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::core::attempt::{AttemptSupervisor, JobReport};
use crate::error::EngineError;
use crate::panic::payload_message;
use crate::schedule::Job;

pub(crate) struct Dispatcher {
    supervisor: Arc<AttemptSupervisor>,
}

impl Dispatcher {
    pub(crate) fn new(supervisor: Arc<AttemptSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Runs until shutdown, then waits for in-flight jobs.
    pub(crate) async fn run(
        self,
        mut rx: mpsc::Receiver<Arc<Job>>,
        shutdown: CancellationToken,
    ) -> Result<(), EngineError> {
        let mut jobs: JoinSet<JobReport> = JoinSet::new();

        let res = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                Some(done) = jobs.join_next(), if !jobs.is_empty() => Self::reap(done),
                next = rx.recv() => match next {
                    Some(job) => {
                        jobs.spawn(Arc::clone(&self.supervisor).run(job, shutdown.clone()));
                    }
                    None if shutdown.is_cancelled() => break Ok(()),
                    None => break Err(EngineError::QueueClosed),
                },
            }
        };

        rx.close();
        if !jobs.is_empty() {
            tracing::debug!(in_flight = jobs.len(), "dispatcher draining in-flight jobs");
        }
        while let Some(done) = jobs.join_next().await {
            Self::reap(done);
        }
        res
    }

    fn reap(done: Result<JobReport, JoinError>) {
        match done {
            Ok(report) => tracing::trace!(
                rule_id = report.rule_id,
                attempts = report.attempts,
                outcome = report.outcome.as_label(),
                "job finished"
            ),
            Err(e) if e.is_panic() => {
                let message = payload_message(e.into_panic().as_ref());
                tracing::error!(panic = %message, "attempt supervisor panicked");
            }
            Err(e) => tracing::debug!(error = %e, "attempt supervisor cancelled"),
        }
    }
}
