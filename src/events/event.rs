//! # Runtime events emitted by the engine.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Catalog & leadership**: rule refreshes, lease claims, skipped ticks
//! - **Queue**: jobs queued or dropped on back-pressure
//! - **Attempt lifecycle**: starting, failed, timed out, retry scheduled, result handling
//! - **Job terminal states**: completed, panicked, aborted by shutdown
//!
//! The [`Event`] struct carries optional metadata (rule, attempt, reason, ...).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use alertvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AttemptFailed)
//!     .with_rule(42, "cpu high")
//!     .with_attempt(2)
//!     .with_reason("datasource unreachable");
//!
//! assert_eq!(ev.kind, EventKind::AttemptFailed);
//! assert_eq!(ev.rule_id, Some(42));
//! assert_eq!(ev.attempt, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing (`rule`: subscriber name, `reason`: payload).
    SubscriberPanicked,
    /// Subscriber dropped an event (`rule`: subscriber name, `reason`: "full" / "closed").
    SubscriberOverflow,

    // === Engine events ===
    /// Shutdown observed by the engine.
    ShutdownRequested,

    // === Catalog & leadership ===
    /// Rule set replaced (`reason`: rule count).
    RulesRefreshed,
    /// Catalog read failed; previous rule set kept (`reason`: error).
    RulesRefreshFailed,
    /// This instance wrote the lease record (`instance`: this instance).
    LeaderClaimed,
    /// Tick not scheduled because another instance holds the lease (`instance`: active one).
    TickSkipped,

    // === Queue ===
    /// Job pushed onto the execution queue.
    JobQueued,
    /// Job dropped because the queue stayed full past `enqueue_timeout`.
    JobDropped,

    // === Attempt lifecycle ===
    /// Attempt is starting (`attempt`: 1-based).
    AttemptStarting,
    /// Attempt finished with an evaluation error (`reason`: error).
    AttemptFailed,
    /// Attempt exceeded the evaluation timeout (`timeout_ms`).
    AttemptTimedOut,
    /// Another attempt will run (`attempt`: failed attempt, `delay_ms`: spacing).
    RetryScheduled,
    /// Result handler returned successfully or with a benign outcome.
    ResultHandled,
    /// Result handler failed (`reason`: error).
    ResultHandlerFailed,

    // === Job terminal states ===
    /// Job reached a natural end (`attempt`: attempts used, `reason`: new state).
    JobCompleted,
    /// Job ended because the evaluation panicked (`reason`: payload).
    JobPanicked,
    /// Job force-cancelled after the shutdown grace period (`reason`: shutdown reason).
    JobAborted,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Rule identifier, if applicable.
    pub rule_id: Option<i64>,
    /// Rule (or subscriber) name, if applicable.
    pub rule: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, states, counts).
    pub reason: Option<Arc<str>>,
    /// Cluster instance identifier.
    pub instance: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            rule_id: None,
            rule: None,
            attempt: None,
            timeout_ms: None,
            delay_ms: None,
            reason: None,
            instance: None,
        }
    }

    /// Attaches a rule identifier and name.
    #[inline]
    pub fn with_rule(mut self, id: i64, name: impl Into<Arc<str>>) -> Self {
        self.rule_id = Some(id);
        self.rule = Some(name.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a cluster instance identifier.
    #[inline]
    pub fn with_instance(mut self, instance: impl Into<Arc<str>>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.rule = Some(subscriber.into());
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.rule = Some(subscriber.into());
        ev
    }
}
