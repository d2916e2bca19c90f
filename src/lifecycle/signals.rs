//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate signals into the internal shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second signal forces immediate exit: the orchestrator's stop is
//!   a termination signal, and a stuck drain must not block it

use crate::lifecycle::shutdown::Shutdown;

/// Wait for SIGTERM or SIGINT and trigger shutdown. A second signal
/// while draining exits the process immediately.
pub async fn shutdown_on_signal(shutdown: Shutdown) {
    wait_for_signal().await;
    tracing::info!("Termination signal received, draining");
    shutdown.trigger();

    wait_for_signal().await;
    tracing::warn!("Second termination signal, exiting immediately");
    std::process::exit(1);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}
