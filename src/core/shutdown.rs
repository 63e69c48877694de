//! # OS termination signals.
//!
//! [`Engine::run_until_signal`](crate::Engine::run_until_signal) stops the
//! engine on the first of:
//! - **Unix:** `SIGINT`, `SIGTERM` (systemd/Kubernetes stop), `SIGQUIT`
//! - **Other platforms:** Ctrl-C

/// Waits for a termination signal and returns its name.
///
/// Fails if the signal listeners cannot be installed.
#[cfg(unix)]
pub(crate) async fn wait_for_termination() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_termination() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl_c")
}
