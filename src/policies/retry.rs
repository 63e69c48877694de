//! # Retry policy for evaluation attempts.
//!
//! [`RetryPolicy`] bounds how many attempts one job may make and, optionally,
//! how long to wait between them.
//!
//! Attempts are numbered from 1. A job whose evaluation fails on attempt `n`
//! retries when `n < max_attempts`; attempt `max_attempts` is always terminal.
//!
//! Without a [`Backoff`] the next attempt starts immediately after the failed
//! one. This is the default and matches how the engine has always retried.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use alertvisor::{Backoff, RetryPolicy};
//!
//! let immediate = RetryPolicy::default();
//! assert_eq!(immediate.max_attempts, 3);
//! assert_eq!(immediate.delay_after(1), Duration::ZERO);
//!
//! let spaced = RetryPolicy {
//!     max_attempts: 5,
//!     backoff: Some(Backoff {
//!         first: Duration::from_millis(200),
//!         max: Duration::from_secs(2),
//!         factor: 2.0,
//!         jitter: false,
//!     }),
//! };
//! assert_eq!(spaced.delay_after(1), Duration::from_millis(200));
//! assert_eq!(spaced.delay_after(2), Duration::from_millis(400));
//! assert_eq!(spaced.delay_after(10), Duration::from_secs(2));
//! ```

use std::time::Duration;

use rand::Rng;

/// Exponential delay between attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth per failed attempt (`>= 1.0` recommended).
    pub factor: f64,
    /// Full jitter: pick uniformly in `[0, delay]`.
    pub jitter: bool,
}

impl Backoff {
    /// Base delay after `failed_attempt` (1-based), before jitter.
    ///
    /// `first × factor^(failed_attempt - 1)`, clamped to `max`. Non-finite or
    /// negative intermediate values clamp to `max` as well.
    fn base(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Attempt budget and spacing for one job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per job, including the first one.
    pub max_attempts: u32,
    /// Optional delay between attempts; `None` retries immediately.
    pub backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    /// Three attempts, no delay between them.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: None,
        }
    }
}

impl RetryPolicy {
    /// True when attempt `attempt` (1-based) may be followed by another one.
    #[inline]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt that follows failed attempt `failed_attempt`.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let Some(backoff) = self.backoff else {
            return Duration::ZERO;
        };

        let base = backoff.base(failed_attempt);
        if !backoff.jitter {
            return base;
        }
        let ms = base.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaced(jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            backoff: Some(Backoff {
                first: Duration::from_millis(100),
                max: Duration::from_secs(1),
                factor: 2.0,
                jitter,
            }),
        }
    }

    #[test]
    fn test_default_retries_immediately() {
        let policy = RetryPolicy::default();
        for attempt in 1..policy.max_attempts {
            assert_eq!(policy.delay_after(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn test_retry_budget_boundaries() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: None,
        };
        assert!(policy.allows_retry_after(1));
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));
        assert!(!policy.allows_retry_after(4));
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: None,
        };
        assert!(!policy.allows_retry_after(1));
    }

    #[test]
    fn test_backoff_grows_and_clamps() {
        let policy = spaced(false);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(5), Duration::from_secs(1));
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_base() {
        let policy = spaced(true);
        for attempt in 1..8 {
            let cap = spaced(false).delay_after(attempt);
            for _ in 0..20 {
                assert!(policy.delay_after(attempt) <= cap);
            }
        }
    }
}
