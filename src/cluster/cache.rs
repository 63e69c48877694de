//! # Shared key/value cache with TTL.
//!
//! The engine uses the cache for one thing: the leader lease record. Any
//! backend with per-key expiry (Redis, memcached, a database row with an
//! expiry column) can implement [`SharedCache`].
//!
//! [`InMemoryCache`] is the bundled backend. Expiry is measured on tokio's
//! clock, so paused-time tests can expire leases with `tokio::time::advance`.
//! Cloning it shares the underlying map, which lets several engines in one
//! process coordinate through it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::CacheError;

/// Key/value store with per-key TTL.
#[async_trait]
pub trait SharedCache: Send + Sync + 'static {
    /// Returns the live value for `key`, `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value, for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Backend name for diagnostics.
    fn provider_name(&self) -> &'static str {
        "custom"
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache. Cheap to clone; clones share state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(e) if e.expires_at > Instant::now() => Ok(Some(e.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
