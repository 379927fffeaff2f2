//! Cache backend trait, flush events and statistics.
//!
//! This module defines what a storage engine must provide to sit behind the
//! [`QueryCache`](super::QueryCache) facade.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use querycache_core::{CacheEntry, CacheResult};

use super::key::{CacheGroup, CacheKey};

/// Request to discard everything stored under one group.
///
/// Created only by [`QueryCache::purge`](super::QueryCache::purge) and
/// consumed only by [`CacheBackend::flush`]. The origin is diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    group: CacheGroup,
    origin: &'static str,
}

impl CacheEvent {
    pub fn new(group: CacheGroup, origin: &'static str) -> Self {
        Self { group, origin }
    }

    pub fn group(&self) -> &CacheGroup {
        &self.group
    }

    pub fn origin(&self) -> &'static str {
        self.origin
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flush group {{{}}} from {}", self.group, self.origin)
    }
}

/// Cache backend trait for pluggable cache implementations.
///
/// Entries live in partitions named by a [`CacheGroup`]; the key already
/// embeds its group, so a backend may store flat or partitioned.
///
/// # Contract
///
/// - `store` overwrites any existing entry under the key.
/// - `fetch` reports a plain miss as `Ok(None)`, never as an error.
/// - `remove` is a no-op for an absent key.
/// - `flush` discards every entry ever stored under the event's group.
///
/// Implementations own their thread safety. A backend may absorb its own
/// failures and report them as misses; the facade passes errors through
/// unchanged either way.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store an entry, replacing any previous one.
    async fn store(&self, group: &CacheGroup, key: &CacheKey, entry: CacheEntry)
        -> CacheResult<()>;

    /// Store an entry that reads as a miss once `ttl` has elapsed.
    ///
    /// Takes precedence over any backend-wide TTL. Backends without per-entry
    /// expiry fall back to a plain [`store`](Self::store).
    async fn store_expiring(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
        ttl: Duration,
    ) -> CacheResult<()> {
        let _ = ttl;
        self.store(group, key, entry).await
    }

    /// Fetch an entry, or `None` on a miss.
    async fn fetch(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<Option<CacheEntry>>;

    /// Remove a single entry.
    async fn remove(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<()>;

    /// Discard a whole group. Returns how many entries were dropped.
    async fn flush(&self, event: &CacheEvent) -> CacheResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> CacheResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate payload size in bytes, where the backend can tell.
    pub memory_bytes: u64,
    /// Entries dropped by expiry or capacity limits.
    pub evictions: u64,
    /// Number of group flushes served.
    pub flushes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
