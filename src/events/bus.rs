//! # Event bus for broadcasting engine events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]: the tick loop, the dispatcher and
//! every attempt supervisor publish into it without blocking.
//!
//! ```text
//! Publishers (many):                 Receivers:
//!   TickLoop    ──┐
//!   Dispatcher  ──┼──────► Bus ───────► subscriber listener ──► SubscriberSet
//!   Supervisors ──┘  (broadcast chan)   Engine::bus().subscribe() (tests, tools)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receivers the event is dropped.
//! - A single ring buffer of `capacity` events is shared by all receivers.
//! - Receivers that fall behind observe `RecvError::Lagged(n)` and skip `n` events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for engine events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::JobQueued));
    }

    #[tokio::test]
    async fn test_receiver_sees_events_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::RulesRefreshed));
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::JobQueued).with_rule(7, "disk"));

        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::JobQueued);
        assert_eq!(ev.rule_id, Some(7));
    }
}
