//! # Clock and ticker.
//!
//! [`Ticker`] produces ticks at `start + k × interval` (k = 1, 2, ...) read
//! from an injectable [`Clock`].
//!
//! ```text
//! ticker task:                           consumer:
//!   next = last + interval
//!   now >= next ? ── try_send(Tick) ──► [cap 1] ──► TickLoop::recv()
//!        │              └─ full → skip tick
//!        └─ no → clock.sleep(next - now)
//! ```
//!
//! ## Rules
//! - At most one tick is outstanding; a slow consumer misses ticks instead of
//!   queueing them.
//! - Tick instants are strictly increasing.
//! - The ticker stops when its token is cancelled or the receiver is dropped.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

/// A scheduler invocation instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick {
    /// Wall-clock instant of the tick.
    pub at: SystemTime,
}

impl Tick {
    /// Creates a tick at `at`.
    pub fn new(at: SystemTime) -> Self {
        Self { at }
    }

    /// Creates a tick at the given unix second.
    pub fn from_unix_secs(secs: u64) -> Self {
        Self {
            at: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    /// Whole seconds since the unix epoch (0 for pre-epoch instants).
    pub fn unix_secs(&self) -> u64 {
        self.at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Time source for the ticker.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;

    /// Suspends for `d`.
    async fn sleep(&self, d: Duration);
}

/// Wall clock that advances with tokio's clock.
///
/// The wall time is captured once and advanced by tokio's monotonic
/// [`Instant`], so paused-time tests (`start_paused = true`) move it forward
/// together with timers.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    wall: SystemTime,
    mono: Instant,
}

impl SystemClock {
    /// Anchors the clock at the current time.
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Anchors the clock at `wall`; useful for simulations and tests.
    pub fn starting_at(wall: SystemTime) -> Self {
        Self {
            wall,
            mono: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        self.wall + self.mono.elapsed()
    }

    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// Truncates `at` to a whole multiple of `interval` since the epoch.
///
/// Used for the ticker's start instant so ticks land on round wall-clock times.
pub fn align_down(at: SystemTime, interval: Duration) -> SystemTime {
    let Ok(since) = at.duration_since(UNIX_EPOCH) else {
        return at;
    };
    let step = interval.as_nanos();
    if step == 0 {
        return at;
    }
    let aligned = since.as_nanos() - since.as_nanos() % step;
    let secs = (aligned / 1_000_000_000) as u64;
    let nanos = (aligned % 1_000_000_000) as u32;
    UNIX_EPOCH + Duration::new(secs, nanos)
}

/// Receiving end of a running ticker task.
#[derive(Debug)]
pub struct Ticker {
    rx: mpsc::Receiver<Tick>,
    task: JoinHandle<()>,
}

impl Ticker {
    /// Starts ticking after `start` every `interval` (clamped to at least 1ms).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        clock: Arc<dyn Clock>,
        start: SystemTime,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let (tx, rx) = mpsc::channel::<Tick>(1);
        let task = tokio::spawn(async move {
            let mut last = start;
            loop {
                let next = last + interval;
                match clock.now().duration_since(next) {
                    Ok(_) => {
                        match tx.try_send(Tick::new(next)) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(skipped)) => {
                                tracing::trace!(at = ?skipped.at, "tick skipped: consumer busy");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => return,
                        }
                        last = next;
                    }
                    Err(ahead) => {
                        tokio::select! {
                            _ = clock.sleep(ahead.duration()) => {}
                            _ = token.cancelled() => return,
                            _ = tx.closed() => return,
                        }
                    }
                }
            }
        });
        Self { rx, task }
    }

    /// Waits for the next tick; `None` once the ticker has stopped.
    pub async fn recv(&mut self) -> Option<Tick> {
        self.rx.recv().await
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
