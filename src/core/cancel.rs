//! # Cancellation bookkeeping for one job.
//!
//! Every attempt and the result-handling phase get their own
//! [`CancellationToken`], registered here. When the job ends, whichever way
//! it ends, [`CancelSet::fire_all`] cancels each registered token exactly once.
//!
//! ## Rules
//! - `fire_all` drains the set; calling it again fires nothing.
//! - A token registered after `fire_all` is cancelled on the spot and still
//!   counted, so `registered == fired` holds once the job is over.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Counters reported in [`JobReport`](crate::JobReport).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CancelStats {
    /// Tokens registered during the job.
    pub registered: u32,
    /// Tokens cancelled by the job's cleanup.
    pub fired: u32,
}

#[derive(Debug, Default)]
struct Inner {
    pending: Vec<CancellationToken>,
    closed: bool,
    stats: CancelStats,
}

/// Registry of the cancellation tokens created during one job.
#[derive(Debug, Default)]
pub(crate) struct CancelSet {
    inner: Mutex<Inner>,
}

impl CancelSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates, registers and returns a fresh token.
    pub(crate) fn issue(&self) -> CancellationToken {
        let token = CancellationToken::new();
        self.register(token.clone());
        token
    }

    pub(crate) fn register(&self, token: CancellationToken) {
        let mut inner = self.inner.lock();
        inner.stats.registered += 1;
        if inner.closed {
            inner.stats.fired += 1;
            drop(inner);
            token.cancel();
        } else {
            inner.pending.push(token);
        }
    }

    /// Cancels every pending token once and closes the set.
    pub(crate) fn fire_all(&self) {
        let pending = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.stats.fired += inner.pending.len() as u32;
            std::mem::take(&mut inner.pending)
        };
        for token in pending {
            token.cancel();
        }
    }

    pub(crate) fn stats(&self) -> CancelStats {
        self.inner.lock().stats
    }
}
