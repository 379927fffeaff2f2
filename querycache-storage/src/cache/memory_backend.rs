//! Process-local cache backend.
//!
//! Entries are partitioned by group, so a flush is a single map removal no
//! matter how many keys the group holds. Optional TTL and per-group capacity
//! limits reclaim entries of groups that were orphaned by a version bump and
//! never explicitly flushed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use querycache_core::{BackendError, CacheEntry, CacheResult};

use super::key::{CacheGroup, CacheKey};
use super::traits::{CacheBackend, CacheEvent, CacheStats};

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: CacheEntry,
    stored_at: Instant,
    ttl: Option<Duration>,
    seq: u64,
}

type Partition = HashMap<String, StoredEntry>;

/// In-memory cache backend.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    partitions: RwLock<HashMap<String, Partition>>,
    stats: RwLock<CacheStats>,
    next_seq: AtomicU64,
    ttl: Option<Duration>,
    max_entries_per_group: Option<usize>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries older than `ttl` read as misses and are dropped.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Cap each group; storing past the cap evicts the oldest entry.
    pub fn with_max_entries_per_group(mut self, max: usize) -> Self {
        self.max_entries_per_group = Some(max.max(1));
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Number of groups currently holding at least one entry.
    pub fn group_count(&self) -> CacheResult<usize> {
        Ok(self.read_partitions()?.len())
    }

    /// Total number of entries across all groups.
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.read_partitions()?.values().map(HashMap::len).sum())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every expired entry in every group. Returns the number dropped.
    pub fn evict_expired(&self) -> CacheResult<u64> {
        let mut partitions = self.write_partitions()?;
        let mut evicted = 0u64;
        for partition in partitions.values_mut() {
            let before = partition.len();
            partition.retain(|_, stored| !self.is_expired(stored));
            evicted += (before - partition.len()) as u64;
        }
        partitions.retain(|_, partition| !partition.is_empty());
        drop(partitions);

        if evicted > 0 {
            self.update_stats(|s| s.evictions += evicted)?;
        }
        Ok(evicted)
    }

    fn is_expired(&self, stored: &StoredEntry) -> bool {
        stored
            .ttl
            .or(self.ttl)
            .is_some_and(|ttl| stored.stored_at.elapsed() >= ttl)
    }

    fn read_partitions(
        &self,
    ) -> CacheResult<std::sync::RwLockReadGuard<'_, HashMap<String, Partition>>> {
        self.partitions
            .read()
            .map_err(|_| BackendError::LockPoisoned.into())
    }

    fn write_partitions(
        &self,
    ) -> CacheResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Partition>>> {
        self.partitions
            .write()
            .map_err(|_| BackendError::LockPoisoned.into())
    }

    fn update_stats(&self, f: impl FnOnce(&mut CacheStats)) -> CacheResult<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| BackendError::LockPoisoned)?;
        f(&mut *stats);
        Ok(())
    }

    /// Remove an expired entry unless a fresh store replaced it meanwhile.
    fn drop_if_expired(&self, group: &str, key: &str) -> CacheResult<bool> {
        let mut partitions = self.write_partitions()?;
        let Some(partition) = partitions.get_mut(group) else {
            return Ok(false);
        };
        let expired = partition
            .get(key)
            .is_some_and(|stored| self.is_expired(stored));
        if expired {
            partition.remove(key);
            if partition.is_empty() {
                partitions.remove(group);
            }
        }
        Ok(expired)
    }

    fn insert(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let stored = StoredEntry {
            entry,
            stored_at: Instant::now(),
            ttl,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut evicted = false;
        {
            let mut partitions = self.write_partitions()?;
            let partition = partitions.entry(group.as_str().to_string()).or_default();

            if let Some(max) = self.max_entries_per_group {
                if !partition.contains_key(key.as_str()) && partition.len() >= max {
                    let oldest = partition
                        .iter()
                        .min_by_key(|(_, s)| s.seq)
                        .map(|(k, _)| k.clone());
                    if let Some(oldest) = oldest {
                        partition.remove(&oldest);
                        evicted = true;
                    }
                }
            }

            partition.insert(key.as_str().to_string(), stored);
        }

        if evicted {
            self.update_stats(|s| s.evictions += 1)?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn store(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> CacheResult<()> {
        self.insert(group, key, entry, None)
    }

    async fn store_expiring(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.insert(group, key, entry, Some(ttl))
    }

    async fn fetch(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let found = {
            let partitions = self.read_partitions()?;
            partitions
                .get(group.as_str())
                .and_then(|p| p.get(key.as_str()))
                .map(|stored| (self.is_expired(stored), stored.entry.clone()))
        };

        match found {
            Some((false, entry)) => {
                self.update_stats(|s| s.hits += 1)?;
                Ok(Some(entry))
            }
            Some((true, _)) => {
                let dropped = self.drop_if_expired(group.as_str(), key.as_str())?;
                self.update_stats(|s| {
                    s.misses += 1;
                    if dropped {
                        s.evictions += 1;
                    }
                })?;
                Ok(None)
            }
            None => {
                self.update_stats(|s| s.misses += 1)?;
                Ok(None)
            }
        }
    }

    async fn remove(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<()> {
        let mut partitions = self.write_partitions()?;
        if let Some(partition) = partitions.get_mut(group.as_str()) {
            partition.remove(key.as_str());
            if partition.is_empty() {
                partitions.remove(group.as_str());
            }
        }
        Ok(())
    }

    async fn flush(&self, event: &CacheEvent) -> CacheResult<u64> {
        let dropped = self
            .write_partitions()?
            .remove(event.group().as_str())
            .map(|partition| partition.len() as u64)
            .unwrap_or(0);

        self.update_stats(|s| s.flushes += 1)?;
        tracing::debug!(
            group = %event.group(),
            origin = event.origin(),
            dropped,
            "In-memory cache group flushed"
        );
        Ok(dropped)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let entry_count = self.len()? as u64;
        let stats = self
            .stats
            .read()
            .map_err(|_| BackendError::LockPoisoned)?;
        Ok(CacheStats {
            entry_count,
            ..stats.clone()
        })
    }
}
