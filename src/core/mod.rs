//! Runtime core: orchestration and lifecycle.
//!
//! The public surface of this module is [`Engine`], its [`EngineBuilder`] and
//! the per-job [`JobReport`].
//!
//! Internal modules:
//! - [`engine`]: wires a run together and supervises the two engine loops;
//! - [`tick_loop`]: ticks, catalog refresh, leader gate, due-rule scheduling;
//! - [`dispatcher`]: drains the queue and spawns one supervisor per job;
//! - [`attempt`]: a job's retry loop, shutdown grace and terminal outcome;
//! - [`runner`]: one evaluation attempt plus result handling;
//! - [`cancel`]: per-job cancellation token bookkeeping;
//! - [`shutdown`]: OS termination signals.

mod attempt;
mod builder;
mod cancel;
mod dispatcher;
mod engine;
mod runner;
mod shutdown;
mod tick_loop;

pub use attempt::{JobOutcome, JobReport};
pub use builder::EngineBuilder;
pub use cancel::CancelStats;
pub use engine::Engine;
