//! # Tick loop.
//!
//! ```text
//! for each tick:
//!   tick_index % refresh_every == 0 → reader.fetch() → scheduler.update()
//!   leader.decide(tick_index)
//!     ├─ Schedule → scheduler.tick(now, queue)
//!     └─ Skip     → nothing this tick
//!   tick_index += 1
//! ```
//!
//! A failed catalog read keeps the previous rule set. The loop only fails when
//! the ticker stops or the queue closes while the engine is still running.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cluster::{LeaderCoordinator, LeaderDecision};
use crate::error::EngineError;
use crate::eval::RuleReader;
use crate::events::{Bus, Event, EventKind};
use crate::schedule::{JobQueue, Scheduler, Tick, Ticker};

pub(crate) struct TickLoop {
    reader: Arc<dyn RuleReader>,
    scheduler: Scheduler,
    leader: LeaderCoordinator,
    bus: Bus,
    refresh_every: u64,
    tick_index: u64,
}

impl TickLoop {
    pub(crate) fn new(
        reader: Arc<dyn RuleReader>,
        leader: LeaderCoordinator,
        bus: Bus,
        refresh_every: u64,
    ) -> Self {
        Self {
            reader,
            scheduler: Scheduler::new(),
            leader,
            bus,
            refresh_every: refresh_every.max(1),
            tick_index: 0,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut ticker: Ticker,
        queue: JobQueue,
        token: CancellationToken,
    ) -> Result<(), EngineError> {
        loop {
            let tick = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                tick = ticker.recv() => tick,
            };
            let Some(tick) = tick else {
                if token.is_cancelled() {
                    return Ok(());
                }
                return Err(EngineError::TickerStopped);
            };

            match self.on_tick(&tick, &queue).await {
                Ok(()) => {}
                Err(_) if token.is_cancelled() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    async fn on_tick(&mut self, tick: &Tick, queue: &JobQueue) -> Result<(), EngineError> {
        let index = self.tick_index;
        self.tick_index += 1;

        if index % self.refresh_every == 0 {
            self.refresh().await;
        }

        match self.leader.decide(index).await {
            LeaderDecision::Schedule => {
                let queued = self.scheduler.tick(tick, queue).await?;
                if queued > 0 {
                    tracing::trace!(queued, at = tick.unix_secs(), "tick scheduled jobs");
                }
            }
            LeaderDecision::Skip { .. } => {}
        }
        Ok(())
    }

    async fn refresh(&mut self) {
        match self.reader.fetch().await {
            Ok(rules) => {
                let count = rules.len();
                self.scheduler.update(rules);
                self.bus
                    .publish(Event::new(EventKind::RulesRefreshed).with_reason(count.to_string()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch alert rules; keeping previous set");
                self.bus
                    .publish(Event::new(EventKind::RulesRefreshFailed).with_reason(e.to_string()));
            }
        }
    }
}
