//! # Cluster coordination.
//!
//! Only the instance named in the lease record schedules work. The record
//! lives in a [`SharedCache`] under [`LEADER_KEY`] and expires after the
//! configured TTL unless the leader keeps renewing it on every tick.
//!
//! - [`SharedCache`] key/value store with TTL; [`InMemoryCache`] bundled backend
//! - [`LeaderCoordinator`] per-tick schedule/skip decision

mod cache;
mod leader;

pub use cache::{InMemoryCache, SharedCache};
pub use leader::{ClusterLeaderRecord, LEADER_KEY, LeaderCoordinator, LeaderDecision};
