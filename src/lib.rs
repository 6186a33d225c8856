//! # linekv - A Small Concurrent In-Memory Key-Value Server
//!
//! linekv keeps byte-string keys and values in memory and serves them over
//! TCP using a line-oriented text protocol. Keys can carry a time-to-live.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌──────────────────────────────┐  ┌─────────────────────────────────┐  │
//! │  │  protocol: framing, tokens,  │  │         StorageEngine           │  │
//! │  │  Command::parse, Response    │  │  64 RwLock shards, lazy expiry  │  │
//! │  └──────────────────────────────┘  └───────────────▲─────────────────┘  │
//! │                                                    │                    │
//! │                                    ┌───────────────┴─────────────────┐  │
//! │                                    │  ExpirySweeper (Tokio task)     │  │
//! │                                    └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use linekv::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::builder().port(6379).build();
//!     let server = Server::bind(config).await?;
//!     server.run(tokio::signal::ctrl_c()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! | Request                  | Reply                    |
//! |--------------------------|--------------------------|
//! | `PING`                   | `+PONG`                  |
//! | `SET key value [secs]`   | `+OK`                    |
//! | `GET key`                | `$value` or `$-1`        |
//! | `DEL key`                | `:1` or `:0`             |
//! | `EXPIRE key secs`        | `:1` or `:0`             |
//!
//! A malformed request gets `-ERR <reason>` and the connection is closed.
//!
//! ## Module Overview
//!
//! - [`protocol`]: line framing, tokenizing and reply serialization
//! - [`commands`]: typed commands and their execution
//! - [`storage`]: thread-safe storage engine with TTL support
//! - [`connection`]: per-client sessions
//! - [`server`]: listener and server lifecycle

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use commands::{Command, CommandHandler};
pub use config::{Config, ConfigBuilder};
pub use connection::{handle_connection, ConnectionStats};
pub use error::ServerError;
pub use protocol::{ParseError, Response};
pub use server::Server;
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port linekv listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host linekv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
