//! In-process shutdown requests.

use std::sync::Arc;

use tokio::sync::watch;

/// A handle that asks the server to begin graceful termination.
///
/// Plays the same role as SIGTERM, but can be raised from inside a request:
/// the dispatcher signals it when a handler chain returns a shutdown-class
/// error. Signalling never blocks and signalling twice is the same as once.
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests shutdown.
    pub fn signal(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_signaled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`signal`](Shutdown::signal) has been called, immediately
    /// if it already was.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|signaled| *signaled).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn signal_wakes_waiters_and_is_idempotent() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };

        assert!(!shutdown.is_signaled());
        shutdown.signal();
        shutdown.signal();
        assert!(shutdown.is_signaled());

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();

        // Late waiters return at once.
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("late waiter returned");
    }
}
