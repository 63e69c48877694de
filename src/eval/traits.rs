//! # Collaborator traits.
//!
//! The engine schedules and supervises; the work itself belongs to three
//! external collaborators wired in through [`EngineBuilder`](crate::EngineBuilder):
//!
//! ```text
//! RuleReader::fetch()      every Nth tick      → current rule set
//! Evaluator::eval(ctx)     once per attempt    → ctx.firing / ctx.no_data_found / ctx.error
//! ResultHandler::handle()  once per job        → Ok / Canceled / DeadlineExceeded / Failed
//! ```
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use alertvisor::{EvalContext, EvalError, Evaluator};
//!
//! struct Threshold(f64);
//!
//! #[async_trait]
//! impl Evaluator for Threshold {
//!     async fn eval(&self, ctx: &mut EvalContext) {
//!         let value: f64 = 0.93; // query the datasource here
//!         if value.is_nan() {
//!             ctx.error = Some(EvalError::failed("datasource returned NaN"));
//!             return;
//!         }
//!         ctx.firing = value > self.0;
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::{HandlerError, ReaderError};
use crate::eval::EvalContext;
use crate::schedule::Rule;

/// Source of the current rule set.
#[async_trait]
pub trait RuleReader: Send + Sync + 'static {
    /// Returns every rule that should be scheduled, in a stable order.
    async fn fetch(&self) -> Result<Vec<Rule>, ReaderError>;
}

/// Turns a rule into a verdict.
///
/// Failures are reported through [`EvalContext::error`], not returned. The
/// engine enforces the evaluation timeout itself; long-running evaluators
/// should still watch [`EvalContext::done`] so their work stops promptly.
#[async_trait]
pub trait Evaluator: Send + Sync + 'static {
    /// Evaluates `ctx.rule`, writing the outcome into `ctx`.
    async fn eval(&self, ctx: &mut EvalContext);
}

/// Delivers the verdict of a finished job.
///
/// Called once per job, after the last attempt, with `ctx.rule.state` already
/// set to the newly computed state.
#[async_trait]
pub trait ResultHandler: Send + Sync + 'static {
    /// Handles the evaluation result.
    async fn handle(&self, ctx: &EvalContext) -> Result<(), HandlerError>;
}
