//! # Event subscribers.
//!
//! ```text
//! AttemptSupervisor ── publish(Event) ──► Bus ──► engine listener ──► SubscriberSet
//!                                                                   ┌────┴────┐
//!                                                                   ▼         ▼
//!                                                               Metrics    Custom
//! ```
//!
//! - [`Subscribe`] the extension trait
//! - [`SubscriberSet`] per-subscriber queues, workers and panic isolation

mod set;
mod subscriber;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;
