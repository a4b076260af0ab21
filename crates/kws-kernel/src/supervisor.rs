//! Process supervision: the shutdown signal shared by the background loops.

use tokio::sync::watch;
use tracing::info;

/// Shutdown signal manager.
pub struct Supervisor {
    /// Send side of the shutdown signal.
    shutdown_tx: watch::Sender<bool>,
    /// Receive side of the shutdown signal (clonable).
    shutdown_rx: watch::Receiver<bool>,
}

impl Supervisor {
    /// Create a new supervisor.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    /// Get a receiver that will be notified on shutdown.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        info!("Supervisor: initiating graceful shutdown");
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_creation() {
        let sup = Supervisor::new();
        assert!(!*sup.subscribe().borrow());
    }

    #[test]
    fn test_late_subscriber_sees_shutdown() {
        let sup = Supervisor::new();
        sup.shutdown();
        assert!(*sup.subscribe().borrow());
    }

    #[tokio::test]
    async fn test_subscriber_sees_shutdown() {
        let sup = Supervisor::new();
        let mut rx = sup.subscribe();
        sup.shutdown();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
