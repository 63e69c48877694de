//! # Engine configuration.
//!
//! Provides [`EngineConfig`], the single immutable settings value handed to
//! [`Engine::builder`](crate::Engine::builder). Every component reads from the
//! copy the engine owns; nothing consults process-global state.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1
//! - `bus_capacity = 0` → clamped to 1
//! - `enqueue_timeout = 0s` → never block: a full queue drops the job immediately
//! - `grace = 0s` → force-cancel in-flight jobs as soon as shutdown is observed

use std::time::Duration;

use crate::{error::ConfigError, policies::RetryPolicy};

/// Leader coordination settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterConfig {
    /// When `false` every tick is scheduled locally.
    pub enabled: bool,
    /// Identifier this instance writes into the lease record.
    pub instance_id: String,
    /// Lease lifetime; a leader that stops renewing loses the lease after this long.
    pub lease_ttl: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            instance_id: String::new(),
            lease_ttl: Duration::from_secs(60),
        }
    }
}

/// Configuration for the alert scheduling engine.
///
/// ## Field semantics
/// - `tick_interval`: ticker period; rules are checked for due-ness once per tick
/// - `refresh_every`: the rule set is re-read from the catalog every Nth tick
/// - `queue_capacity`: bounded execution queue between tick loop and dispatcher
/// - `enqueue_timeout`: how long the tick loop may block on a full queue
/// - `retry`: attempt budget per job
/// - `evaluation_timeout`: deadline for one evaluation attempt
/// - `notification_timeout`: deadline for result handling, started after the last attempt
/// - `grace`: how long an in-flight job may keep running after shutdown is requested
/// - `cluster`: lease-based leader coordination
/// - `bus_capacity`: ring size of the observability event bus
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Ticker period.
    pub tick_interval: Duration,
    /// Refresh the rule set every Nth tick (tick 0 included).
    pub refresh_every: u64,
    /// Execution queue capacity.
    pub queue_capacity: usize,
    /// Longest the tick loop waits for room in a full queue before dropping a job.
    pub enqueue_timeout: Duration,
    /// Attempt budget and spacing.
    pub retry: RetryPolicy,
    /// Per-attempt evaluation deadline.
    pub evaluation_timeout: Duration,
    /// Result-handling deadline.
    pub notification_timeout: Duration,
    /// Shutdown grace period for in-flight jobs.
    pub grace: Duration,
    /// Leader coordination.
    pub cluster: ClusterConfig,
    /// Event bus capacity.
    pub bus_capacity: usize,
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `tick_interval = 1s`, `refresh_every = 10`
    /// - `queue_capacity = 1000`, `enqueue_timeout = 1s`
    /// - `retry = 3 attempts, immediate`
    /// - `evaluation_timeout = 30s`, `notification_timeout = 30s`
    /// - `grace = 5s`
    /// - clustering disabled, `lease_ttl = 60s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            refresh_every: 10,
            queue_capacity: 1000,
            enqueue_timeout: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            evaluation_timeout: Duration::from_secs(30),
            notification_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(5),
            cluster: ClusterConfig::default(),
            bus_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Checks invariants the runtime relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.refresh_every == 0 {
            return Err(ConfigError::ZeroRefreshEvery);
        }
        if self.cluster.enabled {
            if self.cluster.instance_id.trim().is_empty() {
                return Err(ConfigError::MissingInstanceId);
            }
            if self.cluster.lease_ttl.is_zero() {
                return Err(ConfigError::ZeroLeaseTtl);
            }
        }
        Ok(())
    }

    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}
