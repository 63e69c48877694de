//! # Lease-based leader coordination.
//!
//! Every tick, each instance reads the lease record and decides whether to
//! schedule:
//!
//! ```text
//! decide(tick_index)
//!   ├─ clustering disabled          → Schedule
//!   ├─ get(key) failed              → warn, treat as no record
//!   ├─ record undecodable           → treat as no record
//!   ├─ no record / record is ours   → set(key, ours, ttl) → Schedule
//!   └─ record names someone else    → Skip (debug every Nth tick)
//! ```
//!
//! ## Rules
//! - Read-then-write is best effort. Two instances may both claim the lease
//!   for a moment; duplicate evaluation is tolerated.
//! - Cache failures never stop the engine. A failed write still schedules
//!   the tick.
//! - A leader that stops renewing loses the lease once the TTL expires.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cluster::SharedCache;
use crate::config::ClusterConfig;
use crate::events::{Bus, Event, EventKind};

/// Cache key holding the lease record.
pub const LEADER_KEY: &str = "cluster_alerting_instance";

/// Non-leader diagnostics are logged on every Nth tick.
const DIAGNOSTIC_EVERY: u64 = 10;

/// Value stored under [`LEADER_KEY`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterLeaderRecord {
    /// Identifier of the instance currently scheduling.
    pub instance: String,
}

/// Outcome of [`LeaderCoordinator::decide`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaderDecision {
    /// This instance schedules the tick.
    Schedule,
    /// Another instance holds the lease.
    Skip {
        /// Instance named in the lease record.
        active: String,
    },
}

/// Per-tick lease check.
pub struct LeaderCoordinator {
    cfg: ClusterConfig,
    cache: Arc<dyn SharedCache>,
    bus: Bus,
}

impl LeaderCoordinator {
    /// Creates a coordinator for this instance.
    pub fn new(cfg: ClusterConfig, cache: Arc<dyn SharedCache>, bus: Bus) -> Self {
        Self { cfg, cache, bus }
    }

    /// Decides whether this instance schedules the tick numbered `tick_index`.
    pub async fn decide(&self, tick_index: u64) -> LeaderDecision {
        if !self.cfg.enabled {
            return LeaderDecision::Schedule;
        }
        let me = self.cfg.instance_id.as_str();

        let current = match self.cache.get(LEADER_KEY).await {
            Ok(raw) => raw.and_then(|raw| decode(&raw)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    provider = self.cache.provider_name(),
                    "failed to read active instance from cache"
                );
                None
            }
        };

        match current {
            Some(record) if record.instance != me => {
                if tick_index % DIAGNOSTIC_EVERY == 0 {
                    tracing::debug!(
                        instance = me,
                        active = %record.instance,
                        "not the active alerting instance; skipping tick"
                    );
                }
                self.bus.publish(
                    Event::new(EventKind::TickSkipped).with_instance(record.instance.as_str()),
                );
                LeaderDecision::Skip {
                    active: record.instance,
                }
            }
            current => {
                let renewing = current.is_some();
                if self.claim(me).await && !renewing {
                    tracing::debug!(instance = me, "claimed alerting lease");
                    self.bus
                        .publish(Event::new(EventKind::LeaderClaimed).with_instance(me));
                }
                LeaderDecision::Schedule
            }
        }
    }

    /// Writes the lease record naming this instance; returns `true` on success.
    async fn claim(&self, me: &str) -> bool {
        let record = ClusterLeaderRecord {
            instance: me.to_string(),
        };
        let value = match serde_json::to_string(&record) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode lease record");
                return false;
            }
        };
        match self.cache.set(LEADER_KEY, value, self.cfg.lease_ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    instance = me,
                    provider = self.cache.provider_name(),
                    "failed to write active instance to cache"
                );
                false
            }
        }
    }
}

fn decode(raw: &str) -> Option<ClusterLeaderRecord> {
    match serde_json::from_str(raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring undecodable lease record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCache;
    use crate::testing::FlakyCache;
    use std::time::Duration;

    fn cfg(instance: &str) -> ClusterConfig {
        ClusterConfig {
            enabled: true,
            instance_id: instance.to_string(),
            lease_ttl: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_disabled_always_schedules() {
        let cache = Arc::new(InMemoryCache::new());
        let leader = LeaderCoordinator::new(ClusterConfig::default(), cache.clone(), Bus::new(8));
        assert_eq!(leader.decide(0).await, LeaderDecision::Schedule);
        assert_eq!(cache.get(LEADER_KEY).await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_instance_waits_for_lease_expiry() {
        let cache = Arc::new(InMemoryCache::new());
        let a = LeaderCoordinator::new(cfg("a"), cache.clone(), Bus::new(8));
        let b = LeaderCoordinator::new(cfg("b"), cache.clone(), Bus::new(8));

        assert_eq!(a.decide(0).await, LeaderDecision::Schedule);
        assert_eq!(
            b.decide(0).await,
            LeaderDecision::Skip {
                active: "a".into()
            }
        );

        // a keeps renewing
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(a.decide(1).await, LeaderDecision::Schedule);
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(matches!(b.decide(2).await, LeaderDecision::Skip { .. }));

        // a disappears; its lease runs out
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(b.decide(3).await, LeaderDecision::Schedule);
        assert_eq!(
            a.decide(4).await,
            LeaderDecision::Skip {
                active: "b".into()
            }
        );
    }

    #[tokio::test]
    async fn test_garbage_record_is_claimed_over() {
        let cache = Arc::new(InMemoryCache::new());
        cache
            .set(LEADER_KEY, "not json".into(), Duration::from_secs(30))
            .await
            .expect("set");

        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let a = LeaderCoordinator::new(cfg("a"), cache.clone(), bus);
        assert_eq!(a.decide(0).await, LeaderDecision::Schedule);

        let raw = cache.get(LEADER_KEY).await.expect("get").expect("record");
        assert_eq!(decode(&raw).expect("decodes").instance, "a");
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::LeaderClaimed);
        assert_eq!(ev.instance.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_cache_failures_fail_open() {
        let cache = Arc::new(FlakyCache::failing());
        let a = LeaderCoordinator::new(cfg("a"), cache, Bus::new(8));
        assert_eq!(a.decide(0).await, LeaderDecision::Schedule);
    }
}
