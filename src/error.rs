//! Error types used by the alerting engine and its collaborators.
//!
//! - [`EngineError`]: failures of the engine itself (the only errors `run` surfaces).
//! - [`EvalError`]: the outcome slot of one evaluation attempt.
//! - [`HandlerError`]: tri-state outcome of result handling.
//! - [`CacheError`], [`ReaderError`]: failures reported by external collaborators.
//! - [`ConfigError`]: rejected configuration values.
//!
//! Engine, evaluation and handler errors provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the engine runtime.
///
/// Only the tick loop and the dispatch loop may terminate the engine; everything
/// that happens inside a job is contained and never turns into an `EngineError`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// A required collaborator was not supplied to the builder.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// The ticker stopped delivering ticks while the engine was running.
    #[error("ticker stopped unexpectedly")]
    TickerStopped,

    /// The execution queue was closed while the engine was running.
    #[error("execution queue closed unexpectedly")]
    QueueClosed,

    /// One of the engine's top-level loops panicked.
    #[error("{task} panicked: {message}")]
    TaskPanicked {
        /// Loop name (`tick_loop` or `dispatcher`).
        task: &'static str,
        /// Rendered panic payload.
        message: String,
    },

    /// Installing OS signal listeners failed.
    #[error("shutdown signal listener failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use alertvisor::EngineError;
    ///
    /// assert_eq!(EngineError::QueueClosed.as_label(), "engine_queue_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::InvalidConfig(_) => "engine_invalid_config",
            EngineError::MissingCollaborator(_) => "engine_missing_collaborator",
            EngineError::TickerStopped => "engine_ticker_stopped",
            EngineError::QueueClosed => "engine_queue_closed",
            EngineError::TaskPanicked { .. } => "engine_task_panicked",
            EngineError::Signal(_) => "engine_signal",
        }
    }

    /// Returns a human-readable message with the error's details.
    pub fn as_message(&self) -> String {
        match self {
            EngineError::InvalidConfig(e) => format!("invalid config: {e}"),
            EngineError::MissingCollaborator(what) => format!("missing collaborator: {what}"),
            EngineError::TickerStopped => "ticker stopped".to_string(),
            EngineError::QueueClosed => "queue closed".to_string(),
            EngineError::TaskPanicked { task, message } => format!("{task} panicked: {message}"),
            EngineError::Signal(e) => format!("signal listener: {e}"),
        }
    }
}

/// # Outcome slot of one evaluation attempt.
///
/// Evaluators report failures by writing into
/// [`EvalContext::error`](crate::EvalContext); the supervisor writes the
/// timeout and cancellation variants itself. A panicking evaluator ends the
/// whole job as [`JobOutcome::Panicked`](crate::JobOutcome) instead.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The attempt was cancelled (engine shutdown forced it to end).
    #[error("evaluation cancelled")]
    Canceled,

    /// The attempt exceeded the evaluation timeout.
    #[error("evaluation timed out after {timeout:?}")]
    DeadlineExceeded {
        /// The configured evaluation timeout.
        timeout: Duration,
    },

    /// The evaluator failed (query error, bad data, ...).
    #[error("evaluation failed: {reason}")]
    Failed {
        /// Evaluator-provided message.
        reason: String,
    },
}

impl EvalError {
    /// Convenience constructor for [`EvalError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        EvalError::Failed {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EvalError::Canceled => "eval_canceled",
            EvalError::DeadlineExceeded { .. } => "eval_deadline_exceeded",
            EvalError::Failed { .. } => "eval_failed",
        }
    }

    /// Indicates whether another attempt may succeed.
    ///
    /// Returns `true` for [`EvalError::Failed`] and [`EvalError::DeadlineExceeded`].
    ///
    /// # Example
    /// ```
    /// use alertvisor::EvalError;
    ///
    /// assert!(EvalError::failed("connection refused").is_retryable());
    /// assert!(!EvalError::Canceled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvalError::Failed { .. } | EvalError::DeadlineExceeded { .. }
        )
    }
}

/// # Outcome of result handling.
///
/// `Canceled` and `DeadlineExceeded` are expected when shutdown or the
/// notification timeout interrupts delivery; anything else is a real failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Delivery was cancelled.
    #[error("result handling cancelled")]
    Canceled,

    /// Delivery ran past the notification timeout.
    #[error("result handling deadline exceeded")]
    DeadlineExceeded,

    /// Delivery failed.
    #[error("result handling failed: {reason}")]
    Failed {
        /// Handler-provided message.
        reason: String,
    },
}

impl HandlerError {
    /// Convenience constructor for [`HandlerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed {
            reason: reason.into(),
        }
    }

    /// True for cancellation and deadline outcomes (logged at debug, not as failures).
    pub fn is_benign(&self) -> bool {
        matches!(self, HandlerError::Canceled | HandlerError::DeadlineExceeded)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Canceled => "handler_canceled",
            HandlerError::DeadlineExceeded => "handler_deadline_exceeded",
            HandlerError::Failed { .. } => "handler_failed",
        }
    }
}

/// Shared cache failure (connection loss, encoding, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cache error: {reason}")]
pub struct CacheError {
    /// Backend-provided message.
    pub reason: String,
}

impl CacheError {
    /// Creates a new cache error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Rule catalog read failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rule reader error: {reason}")]
pub struct ReaderError {
    /// Backend-provided message.
    pub reason: String,
}

impl ReaderError {
    /// Creates a new reader error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Rejected configuration values.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `retry.max_attempts` must be at least 1.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// `tick_interval` must be positive.
    #[error("tick_interval must be positive")]
    ZeroTickInterval,

    /// `refresh_every` must be at least 1.
    #[error("refresh_every must be at least 1")]
    ZeroRefreshEvery,

    /// Clustering needs a non-empty instance identifier.
    #[error("clustering is enabled but instance_id is empty")]
    MissingInstanceId,

    /// Clustering needs a positive lease TTL.
    #[error("clustering is enabled but lease_ttl is zero")]
    ZeroLeaseTtl,
}
