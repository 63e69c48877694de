//! # Console logging.
//!
//! The engine only emits `tracing` events and spans; installing a subscriber
//! is left to the embedding process. [`init`] is a ready-made one for
//! services and demos: a fmt layer on stdout filtered by `RUST_LOG`, falling
//! back to the given default directive.
//!
//! ```text
//! RUST_LOG=alertvisor=debug     → per-attempt and per-job diagnostics
//! RUST_LOG=alertvisor=trace     → also skipped ticks and reaped jobs
//! ```

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Installs the global console subscriber.
///
/// `default_filter` (for example `"info,alertvisor=debug"`) applies when
/// `RUST_LOG` is unset or invalid. Only the first call has an effect; if
/// another global subscriber is already installed it is left in place.
pub fn init(default_filter: &str) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let use_ansi = std::io::stdout().is_terminal();

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(use_ansi)
            .with_filter(filter);

        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("global tracing subscriber already installed; keeping it");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("warn");
        init("debug");
        assert!(LOGGING_INITIALIZED.get().is_some());
    }
}
