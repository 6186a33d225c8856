//! Storage Engine Module
//!
//! The shared key-value store: a sharded map with per-entry expiry, a
//! pluggable clock, and an optional background sweeper.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲                              ▲
//!            │ now()                        │ cleanup_expired()
//!      ┌─────┴─────┐               ┌────────┴──────────┐
//!      │   Clock   │               │   ExpirySweeper   │
//!      └───────────┘               └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use linekv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set(Bytes::from("greeting"), Bytes::from("hello"), None);
//! assert_eq!(engine.get(b"greeting"), Some(Bytes::from("hello")));
//!
//! engine.set(Bytes::from("token"), Bytes::from("t0k"), Some(Duration::from_secs(3600)));
//! assert!(engine.expire(b"token", Duration::from_secs(60)));
//! assert!(!engine.expire(b"missing", Duration::from_secs(60)));
//! ```

pub mod clock;
pub mod engine;
pub mod expiry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Entry, StorageEngine, StorageStats};
pub use expiry::{ExpiryConfig, ExpirySweeper};
