//! # OS signals that interrupt a serving runtime.
//!
//! Provides [`wait_for_interrupt`] an async helper that completes when the process receives a termination signal.
//! It is only armed inside an isolated context: installing handlers in a cooperative
//! context would take the signals away from the supervisor's own process.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal)
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

/// Waits for a termination signal.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Completes on a termination signal when `armed`; otherwise never.
///
/// A registration failure is logged and treated as "no signal will come".
pub async fn wait_for_interrupt(armed: bool) {
    if !armed {
        return std::future::pending().await;
    }
    if let Err(err) = wait_for_shutdown_signal().await {
        tracing::warn!(error = %err, "failed to install signal handlers; interrupts are not observed");
        std::future::pending::<()>().await;
    }
}
