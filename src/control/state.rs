//! Server session state
//!
//! Shared between the accept loop and whatever requests shutdown (console
//! listener, signal handler).

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::info;

/// Run flag plus shutdown notification for the control server
#[derive(Debug)]
pub struct ServerState {
    running: AtomicBool,
    shutdown: Notify,
}

impl ServerState {
    /// Create a state in the running posture
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            shutdown: Notify::new(),
        }
    }

    /// Whether the accept loop should keep going
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the run flag and wake the accept loop
    ///
    /// Connections already being served run to completion; only the next
    /// accept is prevented.
    pub fn request_shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
        // notify_one keeps a permit if the accept loop is busy serving a client
        self.shutdown.notify_one();
    }

    /// Resolves once shutdown has been requested
    pub(crate) async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }

    pub(crate) fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initially_running() {
        let state = ServerState::new();
        assert!(state.is_running());
    }

    #[test]
    fn test_request_shutdown_is_idempotent() {
        let state = ServerState::new();
        state.request_shutdown();
        state.request_shutdown();
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_before_wait_is_not_lost() {
        let state = ServerState::new();
        state.request_shutdown();

        tokio::time::timeout(Duration::from_secs(1), state.shutdown_requested())
            .await
            .expect("shutdown notification was lost");
    }
}
