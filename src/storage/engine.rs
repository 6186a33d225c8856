//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the key-value store behind every linekv session.
//! Keys and values are raw bytes; each entry may carry an absolute expiry.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: 64 shards, each behind its own `RwLock`, so sessions
//!    touching different keys rarely contend.
//! 2. **Lazy Expiry**: every read checks the expiry and purges a dead entry
//!    before answering. The background sweeper only reclaims memory.
//! 3. **Injectable Clock**: all "now" readings go through [`Clock`].
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A key always maps to the same shard, and every operation on a key holds
//! that shard's lock for its whole duration, so operations on one key are
//! linearizable.

use crate::storage::clock::{Clock, SystemClock};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// A stored value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Bytes,
    /// `None` means the entry lives until deleted or overwritten.
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates an entry, expiring `ttl` after `now` when a TTL is given.
    ///
    /// A TTL too large to represent as an `Instant` is treated as no expiry.
    pub fn new(value: Bytes, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
        }
    }

    /// Checks whether this entry is dead at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

type Shard = RwLock<HashMap<Bytes, Entry>>;

/// The storage engine shared by all sessions.
///
/// Wrap it in an `Arc` and hand a clone to every session; all methods take
/// `&self`.
///
/// # Example
///
/// ```
/// use linekv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("linekv"), None);
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("linekv")));
///
/// engine.set(Bytes::from("session"), Bytes::from("abc123"), Some(Duration::from_secs(60)));
/// assert!(engine.delete(b"session"));
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,
    clock: Arc<dyn Clock>,

    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    /// Entries removed because they had expired (lazily or by the sweeper).
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("clock", &self.clock)
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a storage engine driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a storage engine driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            shards,
            clock,
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    #[inline]
    fn record_expired(&self, n: u64) {
        self.expired_count.fetch_add(n, Ordering::Relaxed);
    }

    /// Inserts or replaces the entry for `key`.
    ///
    /// With a TTL the entry expires `ttl` from now; without one it lives
    /// until deleted or overwritten. Any previous expiry is discarded.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let entry = Entry::new(value, ttl, self.clock.now());
        self.shard(&key).write().insert(key, entry);
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is removed before returning.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard(key);
        let now = self.clock.now();

        // Fast path under the read lock
        {
            let data = shard.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // The entry looked expired; re-check under the write lock since a
        // writer may have replaced it in between.
        let mut data = shard.write();
        match data.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                data.remove(key);
                self.record_expired(1);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Removes a key.
    ///
    /// Returns `true` if an entry existed, whether or not it had expired.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.shard(key).write().remove(key).is_some()
    }

    /// Sets or overwrites the expiry of a live key.
    ///
    /// Returns `false`, without creating anything, if the key is absent or
    /// already expired. A zero TTL removes the key immediately.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut data = self.shard(key).write();

        let Some(entry) = data.get_mut(key) else {
            return false;
        };

        if entry.is_expired_at(now) {
            data.remove(key);
            self.record_expired(1);
            return false;
        }

        if ttl.is_zero() {
            data.remove(key);
            self.record_expired(1);
        } else {
            entry.expires_at = now.checked_add(ttl);
        }
        true
    }

    /// Checks if a key exists and is not expired.
    pub fn exists(&self, key: &[u8]) -> bool {
        let now = self.clock.now();
        self.shard(key)
            .read()
            .get(key)
            .is_some_and(|e| !e.is_expired_at(now))
    }

    /// Returns the number of stored entries.
    ///
    /// Expired entries that have not been purged yet are still counted.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry from every shard.
    ///
    /// Returns the number of entries removed. Called by the expiry sweeper.
    pub fn cleanup_expired(&self) -> u64 {
        let now = self.clock.now();
        let mut cleaned = 0u64;

        for shard in &self.shards {
            let mut data = shard.write();
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired_at(now));
            cleaned += (before - data.len()) as u64;
        }

        if cleaned > 0 {
            self.record_expired(cleaned);
        }

        cleaned
    }

    /// Returns a snapshot of the engine counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

/// Storage engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    pub expired: u64,
}
