//! # Scheduling: what runs and when.
//!
//! ```text
//! Clock ──► Ticker ──► TickLoop ──► Scheduler::tick(now) ──► JobQueue ──► Dispatcher
//!                                       │
//!                                  Rule set (swapped whole on refresh)
//! ```
//!
//! - [`Rule`], [`AlertState`] and the state policies
//! - [`Job`] one rule's slot with its running flag
//! - [`Clock`], [`SystemClock`], [`Ticker`], [`Tick`]
//! - [`Scheduler`] due-rule computation with per-rule staggering
//! - [`JobQueue`] bounded queue with timed back-pressure

mod job;
mod queue;
mod rule;
mod scheduler;
mod ticker;

pub use job::Job;
pub use queue::{JobQueue, PushOutcome};
pub use rule::{AlertState, ErrorPolicy, NoDataPolicy, Rule};
pub use scheduler::Scheduler;
pub use ticker::{Clock, SystemClock, Tick, Ticker, align_down};
