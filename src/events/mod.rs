//! Engine events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `TickLoop`, `JobQueue`, `Dispatcher`, `AttemptSupervisor`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the engine's subscriber listener (fans out to `SubscriberSet`)
//!   and any receiver obtained from [`Engine::bus`](crate::Engine::bus).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
