//! Graceful shutdown fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Broadcasts a single shutdown notice to every subscriber. Cloning shares
/// the same notice; only the first trigger is delivered.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, triggered: Arc::new(AtomicBool::new(false)) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify subscribers. Returns false if shutdown was already under way.
    pub fn trigger(&self, reason: &str) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!(reason, subscribers = self.tx.receiver_count(), "Shutting down");
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut watcher = shutdown.clone().subscribe();

        assert!(!shutdown.is_triggered());
        assert!(shutdown.clone().trigger("signal"));
        assert!(!shutdown.trigger("signal"));
        assert!(shutdown.is_triggered());

        assert!(server.recv().await.is_ok());
        assert!(watcher.recv().await.is_ok());
        assert!(server.try_recv().is_err());
    }
}
