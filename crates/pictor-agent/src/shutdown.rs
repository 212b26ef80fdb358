// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling and draining of in-flight interactions.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Installs handlers for SIGTERM and SIGINT.
///
/// The returned token is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        trigger.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Closes `tracker` and waits up to `timeout` for its tasks.
///
/// Returns `true` when every task finished in time.
pub async fn drain(tracker: &TaskTracker, timeout: Duration) -> bool {
    tracker.close();
    if tracker.is_empty() {
        debug!("no in-flight interactions to drain");
        return true;
    }

    info!(count = tracker.len(), "waiting for in-flight interactions");
    match tokio::time::timeout(timeout, tracker.wait()).await {
        Ok(()) => {
            info!("all interactions drained");
            true
        }
        Err(_) => {
            warn!(
                remaining = tracker.len(),
                timeout_secs = timeout.as_secs(),
                "drain timeout reached, abandoning remaining interactions"
            );
            false
        }
    }
}
