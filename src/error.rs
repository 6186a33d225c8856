//! Server-level errors.
//!
//! Per-request and per-session failures live next to the code that raises
//! them ([`ParseError`](crate::protocol::ParseError),
//! [`ConnectionError`](crate::connection::ConnectionError)) and never leave
//! their session. Only startup failures reach the caller of the server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
