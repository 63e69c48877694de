//! # Run a single evaluation attempt.
//!
//! Executes one attempt of a job inside its own `alert_execution` span and,
//! when the attempt is terminal, the job's result handling.
//!
//! ## Flow
//! ```text
//! issue eval token ─► evaluator.eval(ctx)
//!                        ├─ returns          → ctx as filled in by the evaluator
//!                        ├─ deadline passes  → ctx.error = DeadlineExceeded (AttemptTimedOut)
//!                        ├─ token cancelled  → AttemptStep::Canceled (state untouched)
//!                        └─ panics           → AttemptStep::Panicked
//!
//! retryable error and attempts left → AttemptStep::Retry
//! otherwise:
//!   issue notify token ─► new state written to ctx.rule and the job
//!                     └─► handler.handle(ctx) within notification_timeout
//!                     → AttemptStep::Finished
//! ```
//!
//! ## Rules
//! - Every token is issued through the job's [`CancelSet`]; nothing here cancels
//!   a token itself.
//! - The result-handling deadline starts after the last attempt, so a slow
//!   evaluation cannot eat into it.
//! - A failing result handler never changes the job's outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, field};

use crate::core::attempt::AttemptSupervisor;
use crate::core::cancel::CancelSet;
use crate::error::{EvalError, HandlerError};
use crate::eval::EvalContext;
use crate::events::{Event, EventKind};
use crate::panic::payload_message;
use crate::schedule::{AlertState, Job, Rule};

/// Result of one attempt as seen by the supervisor.
#[derive(Debug)]
pub(crate) enum AttemptStep {
    /// The attempt failed and another one is allowed.
    Retry { error: EvalError },
    /// The job is done: state computed and handed to the result handler.
    Finished {
        state: AlertState,
        error: Option<EvalError>,
    },
    /// The evaluator panicked.
    Panicked { message: String },
    /// The job's tokens were fired while evaluating; nothing was written back.
    Canceled,
}

enum EvalEnd {
    Returned,
    TimedOut,
    Canceled,
    Panicked(String),
}

/// Runs attempt number `attempt` of `job`.
pub(crate) async fn run_attempt(
    sup: Arc<AttemptSupervisor>,
    job: Arc<Job>,
    attempt: u32,
    cancels: Arc<CancelSet>,
) -> AttemptStep {
    let rule = job.rule();
    let span = tracing::info_span!(
        "alert_execution",
        alert_id = rule.id,
        dashboard_id = rule.dashboard_id,
        attempt,
        firing = field::Empty,
        no_data = field::Empty,
    );
    attempt_in_span(sup, job, rule, attempt, cancels)
        .instrument(span)
        .await
}

async fn attempt_in_span(
    sup: Arc<AttemptSupervisor>,
    job: Arc<Job>,
    rule: Rule,
    attempt: u32,
    cancels: Arc<CancelSet>,
) -> AttemptStep {
    let params = &sup.params;
    let (rule_id, rule_name) = (rule.id, rule.name.clone());
    sup.bus.publish(
        Event::new(EventKind::AttemptStarting)
            .with_rule(rule_id, rule_name.as_str())
            .with_attempt(attempt),
    );

    let token = cancels.issue();
    let mut ctx = EvalContext::new(rule, attempt, token.clone(), params.evaluation_timeout);

    let end = tokio::select! {
        biased;
        _ = token.cancelled() => EvalEnd::Canceled,
        res = tokio::time::timeout(
            params.evaluation_timeout,
            AssertUnwindSafe(sup.evaluator.eval(&mut ctx)).catch_unwind(),
        ) => match res {
            Ok(Ok(())) => EvalEnd::Returned,
            Ok(Err(payload)) => EvalEnd::Panicked(payload_message(payload.as_ref())),
            Err(_elapsed) => EvalEnd::TimedOut,
        },
    };
    ctx.finish();

    match end {
        EvalEnd::Returned => {}
        EvalEnd::TimedOut => {
            ctx.error = Some(EvalError::DeadlineExceeded {
                timeout: params.evaluation_timeout,
            });
            sup.bus.publish(
                Event::new(EventKind::AttemptTimedOut)
                    .with_rule(rule_id, rule_name.as_str())
                    .with_attempt(attempt)
                    .with_timeout(params.evaluation_timeout),
            );
        }
        EvalEnd::Canceled => {
            tracing::debug!(rule_id, "alerting execution attempt cancelled");
            return AttemptStep::Canceled;
        }
        EvalEnd::Panicked(message) => {
            tracing::error!(
                rule_id,
                rule = %rule_name,
                panic = %message,
                trace_logged = crate::panic::hook_installed(),
                "alert evaluation panicked"
            );
            return AttemptStep::Panicked { message };
        }
    }

    let span = tracing::Span::current();
    span.record("firing", ctx.firing);
    span.record("no_data", ctx.no_data_found);

    if let Some(err) = ctx.error.clone() {
        if err == EvalError::Canceled {
            tracing::debug!(rule_id, "alerting execution attempt cancelled");
        } else {
            tracing::error!(rule_id, error = %err, "alerting execution attempt failed");
        }
        sup.bus.publish(
            Event::new(EventKind::AttemptFailed)
                .with_rule(rule_id, rule_name.as_str())
                .with_attempt(attempt)
                .with_reason(err.to_string()),
        );

        if err.is_retryable() && params.retry.allows_retry_after(attempt) {
            tracing::debug!(
                rule_id,
                rule = %rule_name,
                attempt,
                "job execution attempt triggered retry"
            );
            return AttemptStep::Retry { error: err };
        }
    }

    let notify = cancels.issue();
    ctx.rebind(notify.clone(), params.notification_timeout);

    let now = sup.clock.now();
    let state = ctx.new_state_at(now);
    if ctx.rule.state != state {
        ctx.rule.last_state_change = now;
    }
    ctx.rule.state = state;
    job.record_state(state, now);

    let handled = tokio::select! {
        biased;
        _ = notify.cancelled() => Err(HandlerError::Canceled),
        res = tokio::time::timeout(
            params.notification_timeout,
            AssertUnwindSafe(sup.handler.handle(&ctx)).catch_unwind(),
        ) => match res {
            Ok(Ok(res)) => res,
            Ok(Err(payload)) => Err(HandlerError::failed(format!(
                "result handler panicked: {}",
                payload_message(payload.as_ref())
            ))),
            Err(_elapsed) => Err(HandlerError::DeadlineExceeded),
        },
    };

    match handled {
        Ok(()) => {
            sup.bus.publish(
                Event::new(EventKind::ResultHandled)
                    .with_rule(rule_id, rule_name.as_str())
                    .with_reason(state.as_str()),
            );
        }
        Err(e) if e.is_benign() => {
            tracing::debug!(rule_id, outcome = e.as_label(), "result handler returned {e}");
            sup.bus.publish(
                Event::new(EventKind::ResultHandled)
                    .with_rule(rule_id, rule_name.as_str())
                    .with_reason(e.as_label()),
            );
        }
        Err(e) => {
            tracing::error!(rule_id, rule = %rule_name, error = %e, "failed to handle result");
            sup.bus.publish(
                Event::new(EventKind::ResultHandlerFailed)
                    .with_rule(rule_id, rule_name.as_str())
                    .with_reason(e.to_string()),
            );
        }
    }

    tracing::debug!(
        rule_id,
        rule = %rule_name,
        firing = ctx.firing,
        attempt,
        elapsed_ms = ctx.elapsed().as_millis() as u64,
        state = %state,
        "job execution completed"
    );
    AttemptStep::Finished {
        state,
        error: ctx.error,
    }
}
