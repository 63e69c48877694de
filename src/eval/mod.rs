//! # Evaluation boundary.
//!
//! - [`RuleReader`], [`Evaluator`], [`ResultHandler`] external collaborators
//! - [`EvalContext`] per-attempt state and next-state computation

mod context;
mod traits;

pub use context::EvalContext;
pub use traits::{Evaluator, ResultHandler, RuleReader};
