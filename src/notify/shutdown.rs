//! Cancellation shared by the watcher loops of one session.

use tokio::sync::watch;

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Fires the shutdown signal.
///
/// Dropping the trigger also counts as shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal every receiver to stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create another signal observing this trigger.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Whether shutdown has been signalled.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observes the shutdown signal at a suspension point.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown is signalled or the trigger is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    /// Whether shutdown has already been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_trigger_wakes_all_signals() {
        let (trigger, signal) = channel();
        let mut first = signal.clone();
        let mut second = signal;

        assert!(!first.is_cancelled());
        trigger.trigger();
        trigger.trigger();

        assert!(timeout(Duration::from_secs(1), first.cancelled()).await.is_ok());
        assert!(timeout(Duration::from_secs(1), second.cancelled()).await.is_ok());
        assert!(trigger.is_triggered());
        assert!(trigger.subscribe().is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_trigger_cancels() {
        let (trigger, mut signal) = channel();
        drop(trigger);
        assert!(timeout(Duration::from_secs(1), signal.cancelled()).await.is_ok());
    }

    #[tokio::test]
    async fn test_pending_until_triggered() {
        let (_trigger, mut signal) = channel();
        assert!(timeout(Duration::from_millis(50), signal.cancelled()).await.is_err());
    }
}
