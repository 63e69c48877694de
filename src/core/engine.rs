//! # Engine: top-level orchestrator.
//!
//! [`Engine::run`] wires the components for one run and supervises the two
//! long-running loops:
//!
//! ```text
//!                 ┌─────────────────── run(shutdown) ───────────────────┐
//! Ticker ──► TickLoop ──► JobQueue (bounded) ──► Dispatcher ──► AttemptSupervisor × N
//!   │           │ refresh every Nth tick                        │
//!   │           └─ LeaderCoordinator (SharedCache lease)        └─► Evaluator / ResultHandler
//!   └─ Clock
//!
//! Bus ──► subscriber listener ──► SubscriberSet
//! ```
//!
//! ## Lifecycle
//! - **Init**: queue, ticker, leader coordinator and supervisor are created per run.
//! - **Run**: tick loop and dispatcher run as two tasks in a `JoinSet`, each
//!   wrapped so a panic becomes [`EngineError::TaskPanicked`].
//! - **Shutdown**: the external token, or either loop ending, cancels the run
//!   group. The dispatcher stops receiving and waits for in-flight jobs, each
//!   of which gets `grace` to finish before it is force-cancelled.
//!
//! `run` returns the first loop error, or `Ok(())` after a requested shutdown.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::cluster::{LeaderCoordinator, SharedCache};
use crate::config::EngineConfig;
use crate::core::attempt::{AttemptParams, AttemptSupervisor};
use crate::core::builder::EngineBuilder;
use crate::core::dispatcher::Dispatcher;
use crate::core::shutdown::wait_for_termination;
use crate::core::tick_loop::TickLoop;
use crate::error::EngineError;
use crate::eval::{Evaluator, ResultHandler, RuleReader};
use crate::events::{Bus, Event, EventKind};
use crate::panic::payload_message;
use crate::schedule::{Clock, JobQueue, Ticker, align_down};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Alert scheduling engine.
///
/// A panicking evaluator is contained and logged with its payload. The stack
/// trace of the panic is only logged when the process has called
/// [`panic::install_hook`](crate::panic::install_hook); its record is emitted
/// inside the attempt's `alert_execution` span, so it carries the rule ids.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use alertvisor::{
///     Engine, EngineConfig, EvalContext, Evaluator, HandlerError, ReaderError,
///     ResultHandler, Rule, RuleReader,
/// };
///
/// struct Catalog;
/// #[async_trait]
/// impl RuleReader for Catalog {
///     async fn fetch(&self) -> Result<Vec<Rule>, ReaderError> {
///         Ok(vec![Rule::new(1, 1, "cpu high", std::time::Duration::from_secs(10))])
///     }
/// }
///
/// struct AlwaysOk;
/// #[async_trait]
/// impl Evaluator for AlwaysOk {
///     async fn eval(&self, _ctx: &mut EvalContext) {}
/// }
///
/// struct Print;
/// #[async_trait]
/// impl ResultHandler for Print {
///     async fn handle(&self, ctx: &EvalContext) -> Result<(), HandlerError> {
///         println!("{} is {}", ctx.rule.name, ctx.rule.state);
///         Ok(())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), alertvisor::EngineError> {
///     alertvisor::panic::install_hook();
///     let engine = Engine::builder(EngineConfig::default())
///         .with_rule_reader(Arc::new(Catalog))
///         .with_evaluator(Arc::new(AlwaysOk))
///         .with_result_handler(Arc::new(Print))
///         .build()?;
///     engine.run_until_signal().await
/// }
/// ```
pub struct Engine {
    cfg: EngineConfig,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    reader: Arc<dyn RuleReader>,
    evaluator: Arc<dyn Evaluator>,
    handler: Arc<dyn ResultHandler>,
    cache: Arc<dyn SharedCache>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Returns a builder for an engine with the given configuration.
    pub fn builder(cfg: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: EngineConfig,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
        reader: Arc<dyn RuleReader>,
        evaluator: Arc<dyn Evaluator>,
        handler: Arc<dyn ResultHandler>,
        cache: Arc<dyn SharedCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subscribers,
            reader,
            evaluator,
            handler,
            cache,
            clock,
        }
    }

    /// The engine's event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Runs until `shutdown` is cancelled or one of the engine loops fails.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), EngineError> {
        let cfg = &self.cfg;
        let group = shutdown.child_token();

        let listener_stop = CancellationToken::new();
        let listener = self.subscriber_listener(listener_stop.clone());

        let (queue, rx) = JobQueue::channel(
            cfg.queue_capacity_clamped(),
            cfg.enqueue_timeout,
            self.bus.clone(),
            group.clone(),
        );
        let start = align_down(self.clock.now(), cfg.tick_interval);
        let ticker = Ticker::spawn(
            Arc::clone(&self.clock),
            start,
            cfg.tick_interval,
            group.clone(),
        );

        let leader = LeaderCoordinator::new(
            cfg.cluster.clone(),
            Arc::clone(&self.cache),
            self.bus.clone(),
        );
        let tick_loop = TickLoop::new(
            Arc::clone(&self.reader),
            leader,
            self.bus.clone(),
            cfg.refresh_every,
        );
        let dispatcher = Dispatcher::new(Arc::new(AttemptSupervisor {
            evaluator: Arc::clone(&self.evaluator),
            handler: Arc::clone(&self.handler),
            clock: Arc::clone(&self.clock),
            params: AttemptParams {
                retry: cfg.retry,
                evaluation_timeout: cfg.evaluation_timeout,
                notification_timeout: cfg.notification_timeout,
                grace: cfg.grace,
            },
            bus: self.bus.clone(),
        }));

        if !crate::panic::hook_installed() {
            tracing::debug!("panic hook not installed; contained panics are logged without a stack trace");
        }
        tracing::info!(
            instance = %cfg.cluster.instance_id,
            clustered = cfg.cluster.enabled,
            tick_interval = ?cfg.tick_interval,
            "alerting engine started"
        );

        let mut loops = JoinSet::new();
        loops.spawn(guarded("tick_loop", tick_loop.run(ticker, queue, group.clone())));
        loops.spawn(guarded("dispatcher", dispatcher.run(rx, group.clone())));

        let mut first_err: Option<EngineError> = None;
        let mut announced = false;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled(), if !announced => {
                    announced = true;
                    tracing::info!("alerting engine shutdown requested");
                    self.bus.publish(Event::new(EventKind::ShutdownRequested));
                    group.cancel();
                }
                joined = loops.join_next() => {
                    let Some(joined) = joined else { break };
                    let res = joined.unwrap_or_else(|e| {
                        Err(EngineError::TaskPanicked {
                            task: "engine loop",
                            message: e.to_string(),
                        })
                    });
                    if let Err(e) = res {
                        tracing::error!(error = %e, label = e.as_label(), "alerting engine loop failed");
                        first_err.get_or_insert(e);
                    }
                    group.cancel();
                }
            }
        }

        listener_stop.cancel();
        if let Ok(subs) = listener.await {
            subs.shutdown().await;
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                tracing::info!("alerting engine stopped");
                Ok(())
            }
        }
    }

    /// Runs until the process receives a termination signal.
    pub async fn run_until_signal(&self) -> Result<(), EngineError> {
        let token = CancellationToken::new();
        let run = self.run(token.clone());
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => return res,
            sig = wait_for_termination() => match sig {
                Ok(name) => {
                    tracing::info!(signal = name, "termination signal received");
                    token.cancel();
                }
                Err(e) => {
                    token.cancel();
                    run.await?;
                    return Err(EngineError::Signal(e));
                }
            },
        }
        run.await
    }

    /// Forwards bus events to the subscriber set until `stop`, then drains
    /// what is already buffered.
    fn subscriber_listener(&self, stop: CancellationToken) -> JoinHandle<SubscriberSet> {
        let mut rx = self.bus.subscribe();
        let subs = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => subs.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "subscriber listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        while let Ok(ev) = rx.try_recv() {
                            subs.emit(&ev);
                        }
                        break;
                    }
                }
            }
            subs
        })
    }
}

/// Converts a panic in an engine loop into [`EngineError::TaskPanicked`].
async fn guarded<F>(task: &'static str, fut: F) -> Result<(), EngineError>
where
    F: Future<Output = Result<(), EngineError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(EngineError::TaskPanicked {
            task,
            message: payload_message(payload.as_ref()),
        }),
    }
}
