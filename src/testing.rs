//! Hand-written fakes for the collaborator traits, shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cluster::SharedCache;
use crate::error::{CacheError, EvalError, HandlerError, ReaderError};
use crate::eval::{EvalContext, Evaluator, ResultHandler, RuleReader};
use crate::schedule::{AlertState, Rule};

/// Catalog returning a settable rule list.
pub(crate) struct StaticReader {
    rules: Mutex<Vec<Rule>>,
    fetches: AtomicU32,
    fail_next: AtomicBool,
}

impl StaticReader {
    pub(crate) fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            fetches: AtomicU32::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub(crate) fn set(&self, rules: Vec<Rule>) {
        *self.rules.lock() = rules;
    }

    pub(crate) fn fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleReader for StaticReader {
    async fn fetch(&self) -> Result<Vec<Rule>, ReaderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ReaderError::new("catalog unavailable"));
        }
        Ok(self.rules.lock().clone())
    }
}

/// Evaluator behaviour.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Script {
    /// Condition false.
    Succeed,
    /// Condition true.
    Fire,
    /// Every attempt fails.
    Fail,
    /// Attempts before the given one fail; that one succeeds.
    FailUntil(u32),
    /// Panics.
    Panic,
    /// Sleeps, but gives up with an error once the context is done.
    Sleep(Duration),
    /// Sleeps regardless of the context.
    SleepIgnoringCancel(Duration),
}

/// Evaluator driven by per-rule scripts, counting calls per rule.
pub(crate) struct ScriptedEvaluator {
    default: Script,
    scripts: HashMap<i64, Script>,
    calls: Mutex<HashMap<i64, u32>>,
}

impl ScriptedEvaluator {
    pub(crate) fn new(default: Script) -> Self {
        Self {
            default,
            scripts: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with_script(mut self, rule_id: i64, script: Script) -> Self {
        self.scripts.insert(rule_id, script);
        self
    }

    pub(crate) fn calls(&self, rule_id: i64) -> u32 {
        self.calls.lock().get(&rule_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn eval(&self, ctx: &mut EvalContext) {
        let id = ctx.rule.id;
        *self.calls.lock().entry(id).or_insert(0) += 1;

        match self.scripts.get(&id).copied().unwrap_or(self.default) {
            Script::Succeed => {}
            Script::Fire => ctx.firing = true,
            Script::Fail => ctx.error = Some(EvalError::failed("query failed")),
            Script::FailUntil(k) => {
                if ctx.attempt() < k {
                    ctx.error = Some(EvalError::failed("query failed"));
                }
            }
            Script::Panic => panic!("evaluator bug"),
            Script::Sleep(d) => {
                tokio::select! {
                    _ = tokio::time::sleep(d) => {}
                    _ = ctx.done() => ctx.error = Some(EvalError::failed("context done")),
                }
            }
            Script::SleepIgnoringCancel(d) => tokio::time::sleep(d).await,
        }
    }
}

/// One recorded result-handler invocation.
#[derive(Clone, Debug)]
pub(crate) struct HandledCall {
    pub(crate) rule_id: i64,
    pub(crate) state: AlertState,
    pub(crate) attempt: u32,
}

/// Result handler that records what it was given.
pub(crate) struct RecordingHandler {
    calls: Mutex<Vec<HandledCall>>,
    outcome: Result<(), HandlerError>,
    delay: Duration,
    finished: AtomicU32,
}

impl RecordingHandler {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: Ok(()),
            delay: Duration::ZERO,
            finished: AtomicU32::new(0),
        }
    }

    pub(crate) fn failing(err: HandlerError) -> Self {
        Self {
            outcome: Err(err),
            ..Self::new()
        }
    }

    /// Sleeps `delay` before returning, regardless of the context.
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> Vec<HandledCall> {
        self.calls.lock().clone()
    }

    /// Invocations that ran to the end instead of being cut off.
    pub(crate) fn finished(&self) -> u32 {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultHandler for RecordingHandler {
    async fn handle(&self, ctx: &EvalContext) -> Result<(), HandlerError> {
        self.calls.lock().push(HandledCall {
            rule_id: ctx.rule.id,
            state: ctx.rule.state,
            attempt: ctx.attempt(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Cache whose every call fails.
pub(crate) struct FlakyCache;

impl FlakyCache {
    pub(crate) fn failing() -> Self {
        Self
    }
}

#[async_trait]
impl SharedCache for FlakyCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::new("connection refused"))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::new("connection refused"))
    }
}
