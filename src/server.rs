//! Connection Listener and Server Lifecycle
//!
//! A [`Server`] owns the listening socket, the storage engine and the
//! optional expiry sweeper. `run` accepts clients until the shutdown future
//! resolves, then drains:
//!
//! ```text
//! bind ──> accept loop ──(shutdown future)──> stop accepting
//!                                                  │
//!                          broadcast shutdown <────┘
//!                                  │
//!                 wait for every session to finish its cycle
//!                                  │
//!                          stop sweeper, return
//! ```

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::{handle_connection, ConnectionStats, SessionConfig, Shutdown};
use crate::error::ServerError;
use crate::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// First pause after a failed `accept`.
const INITIAL_ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Longest pause between `accept` retries.
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// A bound, not yet running, linekv server.
#[derive(Debug)]
pub struct Server {
    config: Config,
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Binds the listening socket with a fresh storage engine.
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        Self::bind_with_storage(config, Arc::new(StorageEngine::new())).await
    }

    /// Binds the listening socket around an existing storage engine.
    pub async fn bind_with_storage(
        config: Config,
        storage: Arc<StorageEngine>,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(addr = %addr, "Listening");

        Ok(Self {
            config,
            listener,
            storage,
            stats: Arc::new(ConnectionStats::new()),
        })
    }

    /// The address actually bound, useful when the configured port is 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Serves clients until `shutdown` resolves, then drains live sessions.
    ///
    /// Accept errors are logged and retried; nothing after a successful bind
    /// stops the server except the shutdown future.
    pub async fn run(self, shutdown: impl Future) {
        let Server {
            config,
            listener,
            storage,
            stats,
        } = self;

        let sweeper = config.sweep_interval.map(|interval| {
            ExpirySweeper::start(Arc::clone(&storage), ExpiryConfig { interval })
        });

        let (notify_shutdown, _) = watch::channel(false);
        let (drain_tx, mut drain_rx) = mpsc::channel::<()>(1);

        let listener_state = Listener {
            listener: &listener,
            session: SessionConfig::from(&config),
            storage: &storage,
            stats: &stats,
            notify_shutdown: &notify_shutdown,
            drain_tx: &drain_tx,
        };

        tokio::select! {
            _ = listener_state.accept_loop() => {}
            _ = shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
            }
        }

        drop(listener);
        notify_shutdown.send_replace(true);
        drop(drain_tx);

        let active = stats.active();
        if active > 0 {
            info!(sessions = active, "Waiting for sessions to finish");
        }
        // Resolves once every session has dropped its `Shutdown`
        let _ = drain_rx.recv().await;

        drop(sweeper);

        let storage_stats = storage.stats();
        info!(
            keys = storage_stats.keys,
            get_ops = storage_stats.get_ops,
            set_ops = storage_stats.set_ops,
            del_ops = storage_stats.del_ops,
            expired = storage_stats.expired,
            "Server shutdown complete"
        );
    }
}

/// Borrowed state for the accept loop.
struct Listener<'a> {
    listener: &'a TcpListener,
    session: SessionConfig,
    storage: &'a Arc<StorageEngine>,
    stats: &'a Arc<ConnectionStats>,
    notify_shutdown: &'a watch::Sender<bool>,
    drain_tx: &'a mpsc::Sender<()>,
}

impl Listener<'_> {
    /// Accepts clients forever, one task per client.
    async fn accept_loop(&self) {
        let mut backoff = INITIAL_ACCEPT_BACKOFF;

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    backoff = INITIAL_ACCEPT_BACKOFF;
                    debug!(client = %addr, "Accepted connection");

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let handler = CommandHandler::new(Arc::clone(self.storage));
                    let shutdown =
                        Shutdown::new(self.notify_shutdown.subscribe(), self.drain_tx.clone());

                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        handler,
                        Arc::clone(self.stats),
                        shutdown,
                        self.session,
                    ));
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_ms = backoff.as_millis() as u64,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_ACCEPT_BACKOFF);
                }
            }
        }
    }
}
