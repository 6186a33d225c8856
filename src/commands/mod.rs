//! Command Module
//!
//! Turns request lines into typed commands and executes them.
//!
//! ```text
//! request line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Command::parse  │  verb, arity and argument checks
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  one storage call per command
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │
//! └─────────────────┘
//! ```

pub mod command;
pub mod handler;

pub use command::{Command, MAX_EXPIRE_SECS};
pub use handler::CommandHandler;
