//! # AttemptSupervisor: one job's retry loop.
//!
//! Owns a job from the moment the dispatcher picks it up until its terminal
//! outcome. Each attempt runs as a nested task (see [`run_attempt`]) so the
//! supervisor can watch the attempt and the shutdown signal at the same time.
//!
//! ## State machine
//! ```text
//! Idle ─► Attempting ─► Retrying ─► Attempting ...
//!              │
//!              └─► ResultHandling ─► Done
//!
//! shutdown (from any non-terminal state):
//!   wait up to `grace` for the attempt to end
//!     ├─ Finished within grace  → Completed
//!     ├─ Retry within grace     → Interrupted (no new attempt starts)
//!     └─ grace elapsed          → fire all tokens, abort attempt → Aborted
//! ```
//!
//! ## Rules
//! - Attempts are strictly sequential; attempt N+1 starts after N returned.
//! - Attempt numbers start at 1 and never exceed `retry.max_attempts`.
//! - On every exit path the job is unmarked running and every registered
//!   token is cancelled exactly once.
//! - Panics stay inside the job: they become [`JobOutcome::Panicked`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::core::cancel::{CancelSet, CancelStats};
use crate::core::runner::{AttemptStep, run_attempt};
use crate::error::EvalError;
use crate::eval::{Evaluator, ResultHandler};
use crate::events::{Bus, Event, EventKind};
use crate::panic::payload_message;
use crate::policies::RetryPolicy;
use crate::schedule::{AlertState, Clock, Job};

/// Terminal outcome of one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job reached result handling.
    Completed {
        /// State written back to the rule.
        state: AlertState,
        /// Error of the last attempt, if it failed.
        error: Option<EvalError>,
    },
    /// Shutdown arrived and the attempt in flight asked for a retry; no
    /// further attempt was started and no result was handled.
    Interrupted {
        /// Error of the last attempt.
        last_error: Option<EvalError>,
    },
    /// The evaluation panicked.
    Panicked {
        /// Rendered panic payload.
        message: String,
    },
    /// Shutdown grace period ran out and the job was force-cancelled.
    Aborted {
        /// The grace period that elapsed.
        grace: Duration,
    },
}

impl JobOutcome {
    /// Short stable label for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::Interrupted { .. } => "interrupted",
            JobOutcome::Panicked { .. } => "panicked",
            JobOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// What a finished supervisor reports back to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    /// Rule the job evaluated.
    pub rule_id: i64,
    /// Attempts started.
    pub attempts: u32,
    /// Terminal outcome.
    pub outcome: JobOutcome,
    /// Cancellation bookkeeping; `registered == fired` once the job is over.
    pub cancels: CancelStats,
}

/// Timing and retry parameters taken from the engine config.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AttemptParams {
    pub(crate) retry: RetryPolicy,
    pub(crate) evaluation_timeout: Duration,
    pub(crate) notification_timeout: Duration,
    pub(crate) grace: Duration,
}

/// Shared by every job of one engine run.
pub(crate) struct AttemptSupervisor {
    pub(crate) evaluator: Arc<dyn Evaluator>,
    pub(crate) handler: Arc<dyn ResultHandler>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) params: AttemptParams,
    pub(crate) bus: Bus,
}

impl AttemptSupervisor {
    /// Supervises `job` until its terminal outcome.
    pub(crate) async fn run(self: Arc<Self>, job: Arc<Job>, shutdown: CancellationToken) -> JobReport {
        job.set_running(true);
        let cancels = Arc::new(CancelSet::new());
        let grace = self.params.grace;
        let mut attempt: u32 = 1;

        let outcome = loop {
            let mut handle = tokio::spawn(run_attempt(
                Arc::clone(&self),
                Arc::clone(&job),
                attempt,
                Arc::clone(&cancels),
            ));

            let joined = tokio::select! {
                biased;
                res = &mut handle => Some(res),
                _ = shutdown.cancelled() => None,
            };
            let joined = match joined {
                Some(res) => res,
                None => match tokio::time::timeout(grace, &mut handle).await {
                    Ok(res) => res,
                    Err(_elapsed) => {
                        handle.abort();
                        cancels.fire_all();
                        let _ = handle.await;
                        break JobOutcome::Aborted { grace };
                    }
                },
            };

            let error = match joined {
                Ok(AttemptStep::Finished { state, error }) => {
                    break JobOutcome::Completed { state, error };
                }
                Ok(AttemptStep::Panicked { message }) => break JobOutcome::Panicked { message },
                Ok(AttemptStep::Canceled) => {
                    break JobOutcome::Interrupted {
                        last_error: Some(EvalError::Canceled),
                    };
                }
                Ok(AttemptStep::Retry { error }) => error,
                Err(e) => break Self::join_failure(e),
            };

            if shutdown.is_cancelled() {
                break JobOutcome::Interrupted {
                    last_error: Some(error),
                };
            }

            let delay = self.params.retry.delay_after(attempt);
            self.bus.publish(
                Event::new(EventKind::RetryScheduled)
                    .with_rule(job.rule_id(), job.rule_name())
                    .with_attempt(attempt)
                    .with_delay(delay),
            );
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => {
                        break JobOutcome::Interrupted { last_error: Some(error) };
                    }
                }
            }
            attempt += 1;
        };

        job.set_running(false);
        cancels.fire_all();
        let report = JobReport {
            rule_id: job.rule_id(),
            attempts: attempt,
            outcome,
            cancels: cancels.stats(),
        };
        self.publish_terminal(&job, &report);
        report
    }

    fn join_failure(e: JoinError) -> JobOutcome {
        if e.is_panic() {
            JobOutcome::Panicked {
                message: payload_message(e.into_panic().as_ref()),
            }
        } else {
            JobOutcome::Interrupted { last_error: None }
        }
    }

    fn publish_terminal(&self, job: &Job, report: &JobReport) {
        let base = |kind| {
            Event::new(kind)
                .with_rule(report.rule_id, job.rule_name())
                .with_attempt(report.attempts)
        };
        match &report.outcome {
            JobOutcome::Completed { state, .. } => {
                self.bus
                    .publish(base(EventKind::JobCompleted).with_reason(state.as_str()));
            }
            JobOutcome::Panicked { message } => {
                tracing::error!(rule_id = report.rule_id, panic = %message, "alert job panicked");
                self.bus
                    .publish(base(EventKind::JobPanicked).with_reason(message.as_str()));
            }
            JobOutcome::Interrupted { .. } => {
                tracing::debug!(rule_id = report.rule_id, "alert job interrupted by shutdown");
                self.bus
                    .publish(base(EventKind::JobAborted).with_reason("interrupted by shutdown"));
            }
            JobOutcome::Aborted { grace } => {
                tracing::warn!(
                    rule_id = report.rule_id,
                    grace = ?grace,
                    "alert job did not finish within shutdown grace; cancelled"
                );
                self.bus.publish(
                    base(EventKind::JobAborted)
                        .with_timeout(*grace)
                        .with_reason("shutdown grace exceeded"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::schedule::{Rule, SystemClock};
    use crate::testing::{RecordingHandler, Script, ScriptedEvaluator};

    fn supervisor(
        evaluator: Arc<ScriptedEvaluator>,
        handler: Arc<RecordingHandler>,
        params: AttemptParams,
    ) -> Arc<AttemptSupervisor> {
        Arc::new(AttemptSupervisor {
            evaluator,
            handler,
            clock: Arc::new(SystemClock::new()),
            params,
            bus: Bus::new(256),
        })
    }

    fn params() -> AttemptParams {
        AttemptParams {
            retry: RetryPolicy::default(),
            evaluation_timeout: Duration::from_secs(30),
            notification_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(5),
        }
    }

    fn job(id: i64) -> Arc<Job> {
        Arc::new(Job::new(Rule::new(id, 10, format!("rule-{id}"), Duration::from_secs(60))))
    }

    #[tokio::test]
    async fn test_always_failing_uses_every_attempt() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Fail));
        let handler = Arc::new(RecordingHandler::new());
        let sup = supervisor(eval.clone(), handler.clone(), params());

        let j = job(1);
        let report = sup.run(j.clone(), CancellationToken::new()).await;

        assert_eq!(eval.calls(1), 3);
        assert_eq!(report.attempts, 3);
        assert!(matches!(
            report.outcome,
            JobOutcome::Completed {
                state: AlertState::Alerting,
                error: Some(EvalError::Failed { .. })
            }
        ));
        let calls = handler.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].state, AlertState::Alerting);
        assert_eq!(calls[0].attempt, 3);
        assert_eq!(j.rule().state, AlertState::Alerting);
        assert!(!j.is_running());
        assert_eq!(report.cancels.registered, 4);
        assert_eq!(report.cancels.registered, report.cancels.fired);
    }

    #[tokio::test]
    async fn test_success_on_second_attempt() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::FailUntil(2)));
        let handler = Arc::new(RecordingHandler::new());
        let sup = supervisor(eval.clone(), handler.clone(), params());

        let report = sup.run(job(1), CancellationToken::new()).await;

        assert_eq!(eval.calls(1), 2);
        assert_eq!(report.attempts, 2);
        assert_eq!(
            report.outcome,
            JobOutcome::Completed {
                state: AlertState::Ok,
                error: None
            }
        );
        assert_eq!(handler.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::SleepIgnoringCancel(
            Duration::from_secs(60),
        )));
        let handler = Arc::new(RecordingHandler::new());
        let mut p = params();
        p.evaluation_timeout = Duration::from_secs(1);
        p.retry.max_attempts = 2;
        let sup = supervisor(eval.clone(), handler.clone(), p);

        let report = sup.run(job(1), CancellationToken::new()).await;

        assert_eq!(report.attempts, 2);
        assert!(matches!(
            report.outcome,
            JobOutcome::Completed {
                error: Some(EvalError::DeadlineExceeded { .. }),
                ..
            }
        ));
        assert_eq!(handler.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Panic));
        let handler = Arc::new(RecordingHandler::new());
        let sup = supervisor(eval.clone(), handler.clone(), params());

        let j = job(1);
        let report = sup.run(j.clone(), CancellationToken::new()).await;

        assert_eq!(eval.calls(1), 1);
        assert!(matches!(report.outcome, JobOutcome::Panicked { .. }));
        assert!(handler.calls().is_empty());
        assert!(!j.is_running());
        assert_eq!(report.cancels.registered, report.cancels.fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_attempt_finish_within_grace() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::SleepIgnoringCancel(
            Duration::from_secs(2),
        )));
        let handler = Arc::new(RecordingHandler::new());
        let sup = supervisor(eval.clone(), handler.clone(), params());
        let shutdown = CancellationToken::new();

        let run = tokio::spawn(Arc::clone(&sup).run(job(1), shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();

        let report = run.await.expect("supervisor task");
        assert!(matches!(report.outcome, JobOutcome::Completed { .. }));
        assert_eq!(handler.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_after_grace() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::SleepIgnoringCancel(
            Duration::from_secs(600),
        )));
        let handler = Arc::new(RecordingHandler::new());
        let mut p = params();
        p.evaluation_timeout = Duration::from_secs(3600);
        let sup = supervisor(eval.clone(), handler.clone(), p);
        let shutdown = CancellationToken::new();

        let j = job(1);
        let run = tokio::spawn(Arc::clone(&sup).run(j.clone(), shutdown.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let cancelled_at = tokio::time::Instant::now();
        shutdown.cancel();

        let report = run.await.expect("supervisor task");
        assert_eq!(
            report.outcome,
            JobOutcome::Aborted {
                grace: Duration::from_secs(5)
            }
        );
        assert!(cancelled_at.elapsed() < Duration::from_secs(6));
        assert!(handler.calls().is_empty());
        assert!(!j.is_running());
        assert_eq!(report.cancels.registered, 1);
        assert_eq!(report.cancels.fired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_spaces_attempts() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Fail));
        let handler = Arc::new(RecordingHandler::new());
        let mut p = params();
        p.retry = RetryPolicy {
            max_attempts: 3,
            backoff: Some(crate::policies::Backoff {
                first: Duration::from_secs(1),
                max: Duration::from_secs(10),
                factor: 2.0,
                jitter: false,
            }),
        };
        let sup = supervisor(eval.clone(), handler.clone(), p);

        let started = tokio::time::Instant::now();
        let report = sup.run(job(1), CancellationToken::new()).await;

        assert_eq!(report.attempts, 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_handler_failure_keeps_completed_outcome() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Fire));
        let handler = Arc::new(RecordingHandler::failing(HandlerError::failed("smtp down")));
        let sup = supervisor(eval.clone(), handler.clone(), params());

        let report = sup.run(job(1), CancellationToken::new()).await;

        assert_eq!(
            report.outcome,
            JobOutcome::Completed {
                state: AlertState::Alerting,
                error: None
            }
        );
        assert_eq!(handler.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluator_watching_deadline_ends_attempt() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Sleep(Duration::from_secs(60))));
        let handler = Arc::new(RecordingHandler::new());
        let mut p = params();
        p.evaluation_timeout = Duration::from_secs(1);
        p.retry.max_attempts = 1;
        let sup = supervisor(eval.clone(), handler.clone(), p);

        let started = tokio::time::Instant::now();
        let report = sup.run(job(1), CancellationToken::new()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(
            report.outcome,
            JobOutcome::Completed {
                state: AlertState::Alerting,
                error: Some(_)
            }
        ));
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_handling_deadline_starts_after_evaluation() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::SleepIgnoringCancel(
            Duration::from_millis(900),
        )));
        let handler = Arc::new(RecordingHandler::slow(Duration::from_millis(4500)));
        let mut p = params();
        p.evaluation_timeout = Duration::from_secs(1);
        p.notification_timeout = Duration::from_secs(5);
        p.retry.max_attempts = 1;
        let sup = supervisor(eval.clone(), handler.clone(), p);
        let mut events = sup.bus.subscribe();

        let started = tokio::time::Instant::now();
        let report = sup.run(job(1), CancellationToken::new()).await;

        assert_eq!(
            report.outcome,
            JobOutcome::Completed {
                state: AlertState::Ok,
                error: None
            }
        );
        assert_eq!(handler.finished(), 1);
        assert!(started.elapsed() >= Duration::from_millis(5400));

        let events = drain(&mut events);
        assert!(events.iter().any(|ev| ev.kind == EventKind::ResultHandled
            && ev.reason.as_deref() == Some("ok")));
        assert!(!events.iter().any(|ev| ev.kind == EventKind::AttemptTimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_is_cut_off_at_notification_timeout() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Fire));
        let handler = Arc::new(RecordingHandler::slow(Duration::from_secs(60)));
        let mut p = params();
        p.notification_timeout = Duration::from_secs(2);
        let sup = supervisor(eval.clone(), handler.clone(), p);
        let mut events = sup.bus.subscribe();

        let started = tokio::time::Instant::now();
        let report = sup.run(job(1), CancellationToken::new()).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(
            report.outcome,
            JobOutcome::Completed {
                state: AlertState::Alerting,
                error: None
            }
        );
        assert_eq!(handler.calls().len(), 1);
        assert_eq!(handler.finished(), 0);

        let events = drain(&mut events);
        assert!(events.iter().any(|ev| ev.kind == EventKind::ResultHandled
            && ev.reason.as_deref() == Some("handler_deadline_exceeded")));
        assert!(!events.iter().any(|ev| ev.kind == EventKind::ResultHandlerFailed));
    }

    #[tokio::test]
    async fn test_handler_error_is_reported_as_failure() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Succeed));
        let handler = Arc::new(RecordingHandler::failing(HandlerError::failed("smtp down")));
        let sup = supervisor(eval.clone(), handler.clone(), params());
        let mut events = sup.bus.subscribe();

        sup.run(job(1), CancellationToken::new()).await;

        let events = drain(&mut events);
        assert!(events.iter().any(|ev| ev.kind == EventKind::ResultHandlerFailed));
        assert!(!events.iter().any(|ev| ev.kind == EventKind::ResultHandled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_cancel_leaves_rule_state_untouched() {
        let eval = Arc::new(ScriptedEvaluator::new(Script::Sleep(Duration::from_secs(600))));
        let handler = Arc::new(RecordingHandler::new());
        let mut p = params();
        p.evaluation_timeout = Duration::from_secs(3600);
        let sup = supervisor(eval.clone(), handler.clone(), p);
        let cancels = Arc::new(CancelSet::new());

        let j = job(1);
        let attempt = tokio::spawn(run_attempt(
            Arc::clone(&sup),
            Arc::clone(&j),
            1,
            Arc::clone(&cancels),
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancels.fire_all();

        let step = attempt.await.expect("attempt task");
        assert!(matches!(step, AttemptStep::Canceled));
        assert_eq!(j.rule().state, AlertState::Unknown);
        assert!(handler.calls().is_empty());
    }
}
