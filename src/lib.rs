//! # alertvisor
//!
//! **Alertvisor** is the scheduling and dispatch core of an alert evaluation
//! engine. On a fixed tick it decides which alert rules are due, runs each due
//! rule as an independently retried and independently timed-out job, and
//! coordinates with other instances so that only one of them evaluates at a
//! time.
//!
//! Rule storage, evaluation logic and notification delivery are external
//! collaborators plugged in through traits.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐      ┌─────────────────────────────────────────────┐
//!   │ Clock/Ticker │─────►│ TickLoop                                    │
//!   └──────────────┘ tick │  - every Nth tick: RuleReader::fetch()      │
//!                         │  - LeaderCoordinator (SharedCache lease)    │
//!                         │  - Scheduler::tick(now) → due jobs          │
//!                         └──────────────────────┬──────────────────────┘
//!                                                ▼
//!                                  JobQueue (bounded, timed push)
//!                                                ▼
//!                         ┌─────────────────────────────────────────────┐
//!                         │ Dispatcher (one task per job, JoinSet)      │
//!                         └──────┬───────────────┬───────────────┬──────┘
//!                                ▼               ▼               ▼
//!                         ┌────────────┐  ┌────────────┐  ┌────────────┐
//!                         │ Attempt    │  │ Attempt    │  │ Attempt    │
//!                         │ Supervisor │  │ Supervisor │  │ Supervisor │
//!                         └─────┬──────┘  └─────┬──────┘  └─────┬──────┘
//!                               │ attempt 1..=max_attempts      │
//!                               ▼                               ▼
//!                         Evaluator::eval ──► ResultHandler::handle
//!
//!   everything publishes ──► Bus ──► subscriber listener ──► SubscriberSet
//! ```
//!
//! ### Job lifecycle
//! ```text
//! Dispatcher ──► AttemptSupervisor::run(job)
//!
//! mark job running
//! loop {
//!   ├─► spawn attempt N (span `alert_execution`)
//!   │       ├─ evaluator within evaluation_timeout
//!   │       ├─ retryable error and N < max_attempts ─► Retry
//!   │       └─ otherwise: new state ─► result handler within notification_timeout
//!   ├─► wait for the attempt, or for shutdown
//!   │       └─ shutdown: give the attempt `grace`, then cancel and abort
//!   └─► Retry ─► (optional backoff) ─► N += 1
//! }
//! unmark running, cancel every token issued for the job exactly once
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                                 |
//! |-------------------|----------------------------------------------------------|----------------------------------------------------|
//! | **Engine**        | Wiring, lifecycle, shutdown                              | [`Engine`], [`EngineBuilder`], [`EngineConfig`]    |
//! | **Collaborators** | Rule catalog, evaluation, result delivery                | [`RuleReader`], [`Evaluator`], [`ResultHandler`]   |
//! | **Scheduling**    | Rules, due-ness, staggering, ticks                       | [`Rule`], [`Scheduler`], [`Ticker`], [`Clock`]     |
//! | **Clustering**    | Lease-based leader election over a TTL cache             | [`SharedCache`], [`InMemoryCache`], [`LeaderCoordinator`] |
//! | **Retry**         | Attempt budget, opt-in backoff                           | [`RetryPolicy`], [`Backoff`]                       |
//! | **Observability** | Events, subscribers, console logging, panic hook         | [`Event`], [`Subscribe`], [`logging`], [`panic`]   |
//! | **Errors**        | Typed errors for the engine and its collaborators        | [`EngineError`], [`EvalError`], [`HandlerError`]   |
//!
//! ## Example
//! See [`Engine`] for a complete program; `demos/single_node.rs` runs one.

mod cluster;
mod config;
mod core;
mod error;
mod eval;
mod events;
pub mod logging;
pub mod panic;
mod policies;
mod schedule;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use cluster::{
    ClusterLeaderRecord, InMemoryCache, LEADER_KEY, LeaderCoordinator, LeaderDecision, SharedCache,
};
pub use config::{ClusterConfig, EngineConfig};
pub use core::{CancelStats, Engine, EngineBuilder, JobOutcome, JobReport};
pub use error::{CacheError, ConfigError, EngineError, EvalError, HandlerError, ReaderError};
pub use eval::{EvalContext, Evaluator, ResultHandler, RuleReader};
pub use events::{Bus, Event, EventKind};
pub use policies::{Backoff, RetryPolicy};
pub use schedule::{
    AlertState, Clock, ErrorPolicy, Job, JobQueue, NoDataPolicy, PushOutcome, Rule, Scheduler,
    SystemClock, Tick, Ticker, align_down,
};
pub use subscribers::{Subscribe, SubscriberSet};
