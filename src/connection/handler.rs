//! Session Handler
//!
//! One `ConnectionHandler` runs per client, in its own task. It owns the
//! client's buffers and drives the request/response cycle.
//!
//! ## Session Lifecycle
//!
//! ```text
//!          accept
//!            │
//!            ▼
//!    ┌──────────────┐  no full line   ┌──────────────┐
//!    │   Parsing    │ ──────────────> │   Reading    │
//!    │              │ <────────────── │              │
//!    └──────┬───────┘   bytes in      └──────┬───────┘
//!           │ Command                        │ EOF / idle / shutdown
//!           ▼                                ▼
//!    ┌──────────────┐                 ┌──────────────┐
//!    │  Executing   │                 │    Closed    │
//!    └──────┬───────┘                 └──────────────┘
//!           │ Response                       ▲
//!           ▼                                │ write error,
//!    ┌──────────────┐                        │ malformed line
//!    │   Writing    │ ───────────────────────┘
//!    └──────┬───────┘
//!           │ flushed
//!           └──────────> Parsing
//! ```
//!
//! A response is flushed before the next buffered line is parsed, so a
//! client never has more than one command in flight.

use crate::commands::{Command, CommandHandler};
use crate::config::Config;
use crate::connection::Shutdown;
use crate::protocol::{find_frame, ParseError, Response};
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Initial read buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling, shared by all sessions.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    pub commands_processed: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn active(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// The per-session subset of [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub idle_timeout: Option<Duration>,
    pub max_line_length: usize,
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            max_line_length: config.max_line_length,
        }
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// Buffered output half; flushed after every response
    stream: BufWriter<TcpStream>,

    addr: SocketAddr,

    /// Bytes received but not yet framed
    buffer: BytesMut,

    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: Shutdown,
    config: SessionConfig,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        shutdown: Shutdown,
        config: SessionConfig,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            shutdown,
            config,
        }
    }

    /// Runs the session until the client leaves, the session fails, or the
    /// server shuts down.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Session closed"),
            Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Shutdown) => {
                debug!(client = %self.addr, "Session closed for server shutdown")
            }
            Err(ConnectionError::IdleTimeout(limit)) => {
                info!(client = %self.addr, idle_secs = limit.as_secs_f64(), "Closing idle session")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Session ended with error"),
        }

        // Best effort: flush anything still buffered and send FIN
        if let Err(e) = self.stream.shutdown().await {
            trace!(client = %self.addr, error = %e, "Socket shutdown failed");
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            loop {
                let frame = match self.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => return Err(self.reject(e).await),
                };

                let command = match Command::parse(&frame) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => return Err(self.reject(e).await),
                };

                trace!(client = %self.addr, command = command.name(), "Executing command");
                let response = self.command_handler.execute(command);
                self.stats.command_processed();

                self.send_response(&response).await?;

                // Finish the current cycle, then honour a pending shutdown
                if self.shutdown.is_shutdown() {
                    return Err(ConnectionError::Shutdown);
                }
            }

            self.read_more_data().await?;
        }
    }

    /// Splits the next complete line off the front of the buffer.
    fn next_frame(&mut self) -> Result<Option<Bytes>, ParseError> {
        match find_frame(&self.buffer, self.config.max_line_length)? {
            Some((frame_len, consumed)) => {
                let mut line = self.buffer.split_to(consumed);
                line.truncate(frame_len);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Framed request"
                );
                Ok(Some(line.freeze()))
            }
            None => Ok(None),
        }
    }

    /// Reports a malformed request to the client.
    ///
    /// Returns the error that ends the session.
    async fn reject(&mut self, err: ParseError) -> ConnectionError {
        warn!(client = %self.addr, error = %err, "Rejecting malformed request");

        match self.send_response(&Response::from(&err)).await {
            Ok(()) => ConnectionError::Parse(err),
            Err(io_err) => io_err,
        }
    }

    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let read = self.stream.get_mut().read_buf(&mut self.buffer);
        let n = tokio::select! {
            result = with_idle_timeout(read, self.config.idle_timeout) => result?,
            _ = self.shutdown.recv() => return Err(ConnectionError::Shutdown),
        };

        if n == 0 {
            return if self.buffer.iter().all(u8::is_ascii_whitespace) {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, response = %response, "Sent response");
        Ok(())
    }
}

/// Awaits a read, giving up after `limit` when one is set.
async fn with_idle_timeout<F>(read: F, limit: Option<Duration>) -> Result<usize, ConnectionError>
where
    F: Future<Output = std::io::Result<usize>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ConnectionError::IdleTimeout(limit)),
        },
        None => Ok(read.await?),
    }
}

/// Reasons a session ends.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Network failure while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent a malformed request
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Client closed the connection between requests
    #[error("client disconnected")]
    ClientDisconnected,

    /// Client closed the connection in the middle of a request line
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// No bytes arrived within the idle timeout
    #[error("idle for more than {0:?}")]
    IdleTimeout(Duration),

    /// The server is shutting down
    #[error("server shutting down")]
    Shutdown,
}

/// Runs a session to completion, absorbing its error.
///
/// Session errors never propagate past the session; [`ConnectionHandler::run`]
/// has already logged them.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: Shutdown,
    config: SessionConfig,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, shutdown, config);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use crate::test_support::TestClient;
    use tokio::net::TcpListener;
    use tokio::sync::{mpsc, watch};

    struct TestServer {
        addr: SocketAddr,
        storage: Arc<StorageEngine>,
        stats: Arc<ConnectionStats>,
        notify_shutdown: watch::Sender<bool>,
    }

    async fn create_test_server(config: SessionConfig) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());
        let (notify_shutdown, _) = watch::channel(false);
        let (drain_tx, _drain_rx) = mpsc::channel(1);

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);
        let notify = notify_shutdown.clone();

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let shutdown = Shutdown::new(notify.subscribe(), drain_tx.clone());
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    handler,
                    Arc::clone(&stats_clone),
                    shutdown,
                    config,
                ));
            }
        });

        TestServer {
            addr,
            storage,
            stats,
            notify_shutdown,
        }
    }

    fn default_session() -> SessionConfig {
        SessionConfig::from(&Config::default())
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        assert_eq!(client.request("PING").await, "+PONG");
    }

    #[tokio::test]
    async fn test_set_get_del_get() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        assert_eq!(client.request("SET foo bar").await, "+OK");
        assert_eq!(client.request("GET foo").await, "$bar");
        assert_eq!(client.request("DEL foo").await, ":1");
        assert_eq!(client.request("GET foo").await, "$-1");
        assert!(server.storage.is_empty());
    }

    #[tokio::test]
    async fn test_crlf_and_lowercase() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        client.send_raw(b"set k \"two words\"\r\n").await;
        assert_eq!(client.read_line().await.as_deref(), Some("+OK"));

        client.send_raw(b"get k\r\n").await;
        assert_eq!(client.read_line().await.as_deref(), Some("$two words"));
    }

    #[tokio::test]
    async fn test_unknown_command_closes_connection() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        assert_eq!(client.request("NOSUCHVERB").await, "-ERR unknown command");
        client.assert_closed().await;
    }

    #[tokio::test]
    async fn test_wrong_arity_closes_connection() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        assert_eq!(
            client.request("GET").await,
            "-ERR wrong number of arguments for 'get' command"
        );
        client.assert_closed().await;
    }

    #[tokio::test]
    async fn test_bad_request_only_closes_its_session() {
        let server = create_test_server(default_session()).await;
        let mut good = TestClient::connect(server.addr).await;
        let mut bad = TestClient::connect(server.addr).await;

        assert_eq!(good.request("SET a 1").await, "+OK");
        assert_eq!(
            bad.request("SET a 1 soon").await,
            "-ERR value is not an integer or out of range"
        );
        bad.assert_closed().await;

        assert_eq!(good.request("GET a").await, "$1");
    }

    #[tokio::test]
    async fn test_blank_lines_ignored() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        client.send_raw(b"\n   \r\nPING\n").await;
        assert_eq!(client.read_line().await.as_deref(), Some("+PONG"));
    }

    #[tokio::test]
    async fn test_request_split_across_writes() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        client.send_raw(b"SE").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.send_raw(b"T split ").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.send_raw(b"value\n").await;

        assert_eq!(client.read_line().await.as_deref(), Some("+OK"));
        assert_eq!(client.request("GET split").await, "$value");
    }

    #[tokio::test]
    async fn test_buffered_lines_answered_in_order() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        client
            .send_raw(b"SET k1 v1\nSET k2 v2\nGET k1\nGET k2\nDEL k1\n")
            .await;

        let mut replies = Vec::new();
        for _ in 0..5 {
            replies.push(client.read_line().await.unwrap());
        }
        assert_eq!(replies, vec!["+OK", "+OK", "$v1", "$v2", ":1"]);
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let config = SessionConfig {
            max_line_length: 16,
            ..default_session()
        };
        let server = create_test_server(config).await;
        let mut client = TestClient::connect(server.addr).await;

        client.send_raw(&[b'x'; 40]).await;
        assert_eq!(
            client.read_line().await.as_deref(),
            Some("-ERR line too long")
        );
        client.assert_closed().await;
    }

    #[tokio::test]
    async fn test_line_at_limit_with_split_crlf() {
        let config = SessionConfig {
            max_line_length: 16,
            ..default_session()
        };
        let server = create_test_server(config).await;
        let mut client = TestClient::connect(server.addr).await;

        // 16 bytes of request, then `\r` and `\n` in separate writes
        client.send_raw(b"SET k 0123456789\r").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.send_raw(b"\n").await;

        assert_eq!(client.read_line().await.as_deref(), Some("+OK"));
        assert_eq!(client.request("GET k").await, "$0123456789");
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let config = SessionConfig {
            idle_timeout: Some(Duration::from_millis(100)),
            ..default_session()
        };
        let server = create_test_server(config).await;
        let mut client = TestClient::connect(server.addr).await;

        assert_eq!(client.request("PING").await, "+PONG");
        tokio::time::sleep(Duration::from_millis(300)).await;
        client.assert_closed().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_session() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        assert_eq!(client.request("PING").await, "+PONG");
        server.notify_shutdown.send_replace(true);
        client.assert_closed().await;
    }

    #[tokio::test]
    async fn test_shutdown_with_pipelined_requests() {
        let server = create_test_server(default_session()).await;
        let mut client = TestClient::connect(server.addr).await;

        client.send_raw(b"SET a 1\nGET a\nGET a\nGET a\n").await;
        assert_eq!(client.read_line().await.as_deref(), Some("+OK"));
        server.notify_shutdown.send_replace(true);

        // Lines answered before the shutdown was seen are complete replies
        let mut answered = 0;
        while let Some(reply) = client.read_line().await {
            assert_eq!(reply, "$1");
            answered += 1;
        }
        assert!(answered <= 3);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let server = create_test_server(default_session()).await;
        let stats = &server.stats;

        assert_eq!(stats.active(), 0);

        let mut client = TestClient::connect(server.addr).await;
        assert_eq!(client.request("PING").await, "+PONG");

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active(), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 5);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 6);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active(), 0);
    }
}
