//! # Demo: single_node
//!
//! Runs the engine on one instance with an in-process rule store, an
//! evaluator that flips some rules between OK and firing, and a handler that
//! prints every new state and saves it back to the store, so the next
//! refresh sees it (rule 2 needs that to move from Pending to Alerting).
//!
//! ## Flow
//! ```text
//! Ticker ──► TickLoop ──► Scheduler (rules 1..=3, staggered) ──► JobQueue
//!                                                                  │
//! Dispatcher ──► AttemptSupervisor ──► FlippingEvaluator ──► SavingHandler ──► RuleStore
//!
//! Bus ──► ConsoleSubscriber (retries, drops, terminal outcomes)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=alertvisor=debug cargo run --example single_node
//! ```
//! Stops after 30 seconds, or earlier on Ctrl-C.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use alertvisor::{
    Engine, EngineConfig, EvalContext, EvalError, Evaluator, Event, EventKind, HandlerError,
    ReaderError, ResultHandler, Rule, RuleReader, Subscribe,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Rule catalog standing in for a database table.
struct RuleStore {
    rules: Mutex<Vec<Rule>>,
}

impl RuleStore {
    fn new() -> Self {
        Self {
            rules: Mutex::new(vec![
                Rule::new(1, 10, "api latency", Duration::from_secs(5)),
                Rule::new(2, 10, "error rate", Duration::from_secs(10))
                    .with_for(Duration::from_secs(15)),
                Rule::new(3, 20, "disk usage", Duration::from_secs(10)),
            ]),
        }
    }

    fn save_state(&self, evaluated: &Rule) {
        if let Some(rule) = self.rules.lock().iter_mut().find(|r| r.id == evaluated.id) {
            rule.state = evaluated.state;
            rule.last_state_change = evaluated.last_state_change;
        }
    }
}

#[async_trait::async_trait]
impl RuleReader for RuleStore {
    async fn fetch(&self) -> Result<Vec<Rule>, ReaderError> {
        Ok(self.rules.lock().clone())
    }
}

/// Rule 2 always fires; the others fire every other evaluation. The first
/// attempt of every third evaluation fails.
#[derive(Default)]
struct FlippingEvaluator {
    evaluations: AtomicU32,
}

#[async_trait::async_trait]
impl Evaluator for FlippingEvaluator {
    async fn eval(&self, ctx: &mut EvalContext) {
        let n = self.evaluations.fetch_add(1, Ordering::Relaxed);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
            _ = ctx.done() => {
                ctx.error = Some(EvalError::failed("evaluation interrupted"));
                return;
            }
        }
        if n % 3 == 0 && ctx.attempt() == 1 {
            ctx.error = Some(EvalError::failed("datasource unreachable"));
            return;
        }
        ctx.firing = ctx.rule.id == 2 || n % 2 == 0;
    }
}

struct SavingHandler {
    store: Arc<RuleStore>,
}

#[async_trait::async_trait]
impl ResultHandler for SavingHandler {
    async fn handle(&self, ctx: &EvalContext) -> Result<(), HandlerError> {
        self.store.save_state(&ctx.rule);
        println!(
            "[handler] rule={} state={} attempt={} took={:?}",
            ctx.rule.name,
            ctx.rule.state,
            ctx.attempt(),
            ctx.elapsed()
        );
        Ok(())
    }
}

struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let rule = ev.rule.as_deref().unwrap_or("<none>");
        match ev.kind {
            EventKind::RetryScheduled => println!(
                "[sub] retry:     rule={rule} after_attempt={}",
                ev.attempt.unwrap_or(0)
            ),
            EventKind::JobDropped => println!("[sub] dropped:   rule={rule}"),
            EventKind::JobCompleted => println!(
                "[sub] completed: rule={rule} attempts={} state={}",
                ev.attempt.unwrap_or(0),
                ev.reason.as_deref().unwrap_or("<unknown>")
            ),
            EventKind::JobPanicked | EventKind::JobAborted => println!(
                "[sub] {:?}: rule={rule} reason={}",
                ev.kind,
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    alertvisor::logging::init("info,alertvisor=debug");
    alertvisor::panic::install_hook();

    let store = Arc::new(RuleStore::new());
    let engine = Engine::builder(EngineConfig::default())
        .with_rule_reader(store.clone())
        .with_evaluator(Arc::new(FlippingEvaluator::default()))
        .with_result_handler(Arc::new(SavingHandler { store }))
        .with_subscribers(vec![Arc::new(ConsoleSubscriber) as Arc<dyn Subscribe>])
        .build()?;

    let shutdown = CancellationToken::new();
    let stopper = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            shutdown.cancel();
        })
    };

    engine.run(shutdown).await?;
    stopper.abort();
    Ok(())
}
