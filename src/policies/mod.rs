//! Retry policy.
//!
//! ## Contents
//! - [`RetryPolicy`] attempt budget per job (`max_attempts`) plus optional spacing
//! - [`Backoff`]     exponential delay between attempts, with optional full jitter
//!
//! ## Quick wiring
//! ```text
//! EngineConfig { retry: RetryPolicy, .. }
//!      └─► core::attempt::AttemptSupervisor uses:
//!           - allows_retry_after(attempt) to decide retry vs. result handling
//!           - delay_after(attempt) before the next attempt (zero by default)
//! ```

mod retry;

pub use retry::{Backoff, RetryPolicy};
