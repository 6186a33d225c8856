//! Command Executor
//!
//! Runs a parsed [`Command`] against the storage engine and turns the
//! outcome into a [`Response`]. Each command makes exactly one storage call
//! (`PING` makes none) and storage calls cannot fail, so every command that
//! made it through the parser gets a non-error reply.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │   Command ──> execute() ──> StorageEngine ──> Response      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::Command;
use crate::protocol::Response;
use crate::storage::StorageEngine;
use std::sync::Arc;

/// Executes commands against the shared storage engine.
///
/// Cheap to clone; each session gets its own handle.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Executes a command and returns the reply.
    pub fn execute(&self, command: Command) -> Response {
        match command {
            Command::Ping => Response::pong(),

            Command::Get { key } => match self.storage.get(&key) {
                Some(value) => Response::bulk(value),
                None => Response::null(),
            },

            Command::Set { key, value, ttl } => {
                self.storage.set(key, value, ttl);
                Response::ok()
            }

            Command::Del { key } => Response::boolean(self.storage.delete(&key)),

            Command::Expire { key, ttl } => Response::boolean(self.storage.expire(&key, ttl)),
        }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }
}
