//! Connection Module
//!
//! Every accepted client gets its own Tokio task running a
//! [`ConnectionHandler`]. Sessions share nothing but the storage engine,
//! the connection statistics and the shutdown signal.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Server (accept loop)                    │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ spawn per client
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Frame+parse │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │         ▲                                     ▼             │
//! │         └──────────────────────────── ┌─────────────┐      │
//! │                                       │ Write+flush │      │
//! │                                       └─────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;
pub mod shutdown;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, SessionConfig,
};
pub use shutdown::Shutdown;
