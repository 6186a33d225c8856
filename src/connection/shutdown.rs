//! Per-session view of the server shutdown signal.

use tokio::sync::{mpsc, watch};

/// Listens for the server shutdown signal.
///
/// The server flips a `watch` channel to `true` when it stops accepting
/// connections. Each session owns one `Shutdown`; it also carries a clone of
/// the server's drain sender, so the server knows every session has finished
/// once all `Shutdown` values are dropped.
#[derive(Debug)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: watch::Receiver<bool>,
    _drain: mpsc::Sender<()>,
}

impl Shutdown {
    pub fn new(notify: watch::Receiver<bool>, drain: mpsc::Sender<()>) -> Self {
        Self {
            is_shutdown: false,
            notify,
            _drain: drain,
        }
    }

    /// Returns `true` once the shutdown signal has been sent.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown || *self.notify.borrow()
    }

    /// Waits for the shutdown signal. Returns at once if it was already sent.
    ///
    /// A server that went away without signalling counts as a shutdown.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        let _ = self.notify.wait_for(|&stop| stop).await;
        self.is_shutdown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recv_after_signal() {
        let (tx, rx) = watch::channel(false);
        let (drain_tx, _drain_rx) = mpsc::channel(1);
        let mut shutdown = Shutdown::new(rx, drain_tx);

        assert!(!shutdown.is_shutdown());
        tx.send_replace(true);
        assert!(shutdown.is_shutdown());

        tokio::time::timeout(Duration::from_secs(1), shutdown.recv())
            .await
            .expect("recv should return once signalled");
    }

    #[tokio::test]
    async fn test_recv_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        let (drain_tx, _drain_rx) = mpsc::channel(1);
        let mut shutdown = Shutdown::new(rx, drain_tx);

        drop(tx);
        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
    }

    #[tokio::test]
    async fn test_drop_releases_drain() {
        let (_tx, rx) = watch::channel(false);
        let (drain_tx, mut drain_rx) = mpsc::channel::<()>(1);

        let shutdown = Shutdown::new(rx, drain_tx);
        drop(shutdown);

        assert_eq!(drain_rx.recv().await, None);
    }
}
