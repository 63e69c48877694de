//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for plugging metrics, audit
//! trails or custom alert bookkeeping into the engine.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently of the engine loops)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::SubscriberPanicked`)
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use alertvisor::{Event, EventKind, Subscribe};
//!
//! struct AttemptCounter;
//!
//! #[async_trait]
//! impl Subscribe for AttemptCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::AttemptFailed) {
//!             // bump a counter, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "attempt-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for engine observability.
///
/// Slow processing affects only this subscriber's queue; the engine never
/// waits on a subscriber.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Subscriber name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
