//! Backend selection from [`QueryCacheConfig`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use querycache_core::{BackendConfig, CacheEntry, CacheResult, QueryCacheConfig};

use super::facade::QueryCache;
use super::key::{CacheGroup, CacheKey};
use super::lmdb_backend::LmdbCacheBackend;
use super::memory_backend::InMemoryCacheBackend;
use super::traits::{CacheBackend, CacheEvent, CacheStats};

/// Whichever backend the configuration asked for.
pub enum ConfiguredBackend {
    Memory(InMemoryCacheBackend),
    Lmdb(LmdbCacheBackend),
}

impl ConfiguredBackend {
    pub fn from_config(config: &QueryCacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let backend = match &config.backend {
            BackendConfig::Memory => {
                let mut backend = InMemoryCacheBackend::new();
                if let Some(ttl) = config.ttl() {
                    backend = backend.with_ttl(ttl);
                }
                if let Some(max) = config.max_entries_per_group {
                    backend = backend.with_max_entries_per_group(max);
                }
                ConfiguredBackend::Memory(backend)
            }
            BackendConfig::Lmdb { path, max_size_mb } => {
                let mut backend = LmdbCacheBackend::new(path, *max_size_mb)?;
                if let Some(ttl) = config.ttl() {
                    backend = backend.with_ttl(ttl);
                }
                if config.max_entries_per_group.is_some() {
                    tracing::warn!("max_entries_per_group is ignored by the LMDB backend");
                }
                ConfiguredBackend::Lmdb(backend)
            }
        };
        Ok(backend)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConfiguredBackend::Memory(_) => "memory",
            ConfiguredBackend::Lmdb(_) => "lmdb",
        }
    }
}

#[async_trait]
impl CacheBackend for ConfiguredBackend {
    async fn store(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> CacheResult<()> {
        match self {
            ConfiguredBackend::Memory(b) => b.store(group, key, entry).await,
            ConfiguredBackend::Lmdb(b) => b.store(group, key, entry).await,
        }
    }

    async fn store_expiring(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
        ttl: Duration,
    ) -> CacheResult<()> {
        match self {
            ConfiguredBackend::Memory(b) => b.store_expiring(group, key, entry, ttl).await,
            ConfiguredBackend::Lmdb(b) => b.store_expiring(group, key, entry, ttl).await,
        }
    }

    async fn fetch(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        match self {
            ConfiguredBackend::Memory(b) => b.fetch(group, key).await,
            ConfiguredBackend::Lmdb(b) => b.fetch(group, key).await,
        }
    }

    async fn remove(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<()> {
        match self {
            ConfiguredBackend::Memory(b) => b.remove(group, key).await,
            ConfiguredBackend::Lmdb(b) => b.remove(group, key).await,
        }
    }

    async fn flush(&self, event: &CacheEvent) -> CacheResult<u64> {
        match self {
            ConfiguredBackend::Memory(b) => b.flush(event).await,
            ConfiguredBackend::Lmdb(b) => b.flush(event).await,
        }
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        match self {
            ConfiguredBackend::Memory(b) => b.stats().await,
            ConfiguredBackend::Lmdb(b) => b.stats().await,
        }
    }
}

/// Build the process-wide cache from configuration.
///
/// Call once at startup and pass the returned handle to every caller.
pub fn build_query_cache(
    config: &QueryCacheConfig,
) -> CacheResult<Arc<QueryCache<ConfiguredBackend>>> {
    let backend = ConfiguredBackend::from_config(config)?;
    tracing::info!(
        enabled = config.enabled,
        backend = backend.kind(),
        ttl_secs = ?config.ttl_secs,
        "Query cache initialized"
    );
    Ok(QueryCache::shared(Arc::new(backend), config.enabled))
}
