//! The query cache facade.
//!
//! Callers in the persistence layer hand over `(ds_name, table, version,
//! query, params)` and get back a cached result or `None`. A miss and a
//! disabled cache look identical on purpose: callers always have the database
//! to fall back on and must not branch on why nothing came back.
//!
//! # Invalidation
//!
//! Every key is derived from a [`CacheGroup`] that embeds the table version.
//! On a write the caller bumps the version and calls [`QueryCache::purge`]
//! for the old one. Entries under the old group are never reachable again;
//! the backend drops them on flush or reclaims them by its own eviction.
//!
//! # Concurrency
//!
//! The facade holds no mutable state and is shared as `Arc<QueryCache<B>>`.
//! An `add` into version `v` that races a `purge` of `v` can leave a stale
//! entry behind in the orphaned group until the backend evicts it. Nothing
//! reads it once callers pass `v + 1`, so this layer does not coordinate.

use std::sync::Arc;
use std::time::Duration;

use querycache_core::{
    CacheEntry, CacheResult, FromCacheEntry, SqlValue, TableMeta, TableVersion,
};

use super::access_log::{log_access, Access};
use super::key::{CacheGroup, CacheKey};
use super::table_scope::TableCache;
use super::traits::{CacheBackend, CacheEvent, CacheStats};

/// Versioned query-result cache over a pluggable backend.
///
/// # Example
///
/// ```ignore
/// let cache = QueryCache::shared(Arc::new(InMemoryCacheBackend::new()), true);
///
/// let sql = "SELECT * FROM users WHERE id=?";
/// cache.add("main", "users", 1, sql, Some(&[SqlValue::Int(42)]), rows).await?;
/// let hit: Option<Vec<Record>> = cache.get("main", "users", 1, sql, Some(&[SqlValue::Int(42)])).await?;
///
/// // after a write to `users`
/// cache.purge("main", "users", 1).await?;
/// ```
pub struct QueryCache<B>
where
    B: CacheBackend,
{
    backend: Arc<B>,
    enabled: bool,
}

impl<B> QueryCache<B>
where
    B: CacheBackend,
{
    /// Origin tag attached to every flush event this facade raises.
    pub const ORIGIN: &'static str = concat!(module_path!(), "::QueryCache");

    /// Create a facade. `enabled` is fixed for the lifetime of the instance.
    pub fn new(backend: Arc<B>, enabled: bool) -> Self {
        Self { backend, enabled }
    }

    /// Create the process-wide instance, ready to hand to every caller.
    pub fn shared(backend: Arc<B>, enabled: bool) -> Arc<Self> {
        Arc::new(Self::new(backend, enabled))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get a reference to the cache backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Scoped view that also honors the table's own caching flag.
    pub fn for_table<'a>(&'a self, meta: &'a TableMeta) -> TableCache<'a, B> {
        TableCache::new(self, meta)
    }

    /// Cache a query result.
    ///
    /// No-op when the cache is disabled.
    pub async fn add(
        &self,
        ds_name: &str,
        table: &str,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
        value: impl Into<CacheEntry>,
    ) -> CacheResult<()> {
        self.store_entry(ds_name, table, version, query, params, value.into(), None)
            .await
    }

    /// Cache a query result that reads as a miss once `ttl` has elapsed.
    ///
    /// No-op when the cache is disabled.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_expiring(
        &self,
        ds_name: &str,
        table: &str,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
        value: impl Into<CacheEntry>,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.store_entry(ds_name, table, version, query, params, value.into(), Some(ttl))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn store_entry(
        &self,
        ds_name: &str,
        table: &str,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
        entry: CacheEntry,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let (group, key) = derive(ds_name, table, version, query, params)?;
        if !self.enabled {
            return Ok(());
        }

        match ttl {
            Some(ttl) => self.backend.store_expiring(&group, &key, entry, ttl).await?,
            None => self.backend.store(&group, &key, entry).await?,
        }
        log_access(&group, Some(query), params, Access::Store);
        Ok(())
    }

    /// Look up a cached query result.
    ///
    /// Returns `Ok(None)` on a miss, when the cache is disabled, or when the
    /// stored entry has a different shape than `T`.
    pub async fn get<T>(
        &self,
        ds_name: &str,
        table: &str,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
    ) -> CacheResult<Option<T>>
    where
        T: FromCacheEntry,
    {
        let (group, key) = derive(ds_name, table, version, query, params)?;
        if !self.enabled {
            return Ok(None);
        }

        let Some(entry) = self.backend.fetch(&group, &key).await? else {
            log_access(&group, Some(query), params, Access::Miss);
            return Ok(None);
        };

        match T::from_entry(entry) {
            Ok(value) => {
                log_access(&group, Some(query), params, Access::Hit);
                Ok(Some(value))
            }
            Err(stored) => {
                tracing::warn!(
                    group = %group,
                    query,
                    stored_shape = stored.shape(),
                    requested = std::any::type_name::<T>(),
                    "Cached entry has unexpected shape, treating as miss"
                );
                Ok(None)
            }
        }
    }

    /// Drop the cached result of one query/parameter combination.
    pub async fn remove(
        &self,
        ds_name: &str,
        table: &str,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
    ) -> CacheResult<()> {
        let (group, key) = derive(ds_name, table, version, query, params)?;
        if !self.enabled {
            return Ok(());
        }

        self.backend.remove(&group, &key).await?;
        log_access(&group, Some(query), params, Access::Remove);
        Ok(())
    }

    /// Discard everything cached for `(ds_name, table, version)`.
    ///
    /// The caller is expected to have moved on to a newer version already.
    pub async fn purge(&self, ds_name: &str, table: &str, version: TableVersion) -> CacheResult<()> {
        let group = CacheGroup::new(ds_name, table, version)?;
        if !self.enabled {
            return Ok(());
        }

        let event = CacheEvent::new(group, Self::ORIGIN);
        let dropped = self.backend.flush(&event).await?;
        log_access(event.group(), None, None, Access::Purge);
        tracing::trace!(group = %event.group(), dropped, "Cache group flushed");
        Ok(())
    }

    /// Get backend statistics.
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        self.backend.stats().await
    }
}

impl<B> Clone for QueryCache<B>
where
    B: CacheBackend,
{
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            enabled: self.enabled,
        }
    }
}

impl<B> std::fmt::Debug for QueryCache<B>
where
    B: CacheBackend,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Argument validation runs even when the cache is disabled, so contract
/// violations surface regardless of configuration.
fn derive(
    ds_name: &str,
    table: &str,
    version: TableVersion,
    query: &str,
    params: Option<&[SqlValue]>,
) -> CacheResult<(CacheGroup, CacheKey)> {
    let group = CacheGroup::new(ds_name, table, version)?;
    let key = CacheKey::new(&group, query, params)?;
    Ok((group, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_backend::InMemoryCacheBackend;
    use querycache_core::{QueryCacheError, Record, ValidationError};

    const SQL: &str = "SELECT * FROM users WHERE id=?";

    fn row(id: i64) -> Record {
        let mut row = Record::new();
        row.insert("id".to_string(), SqlValue::Int(id));
        row
    }

    fn enabled_cache() -> QueryCache<InMemoryCacheBackend> {
        QueryCache::new(Arc::new(InMemoryCacheBackend::new()), true)
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let cache = enabled_cache();
        let params = [SqlValue::Int(42)];
        cache
            .add("main", "users", 1, SQL, Some(&params), vec![row(42)])
            .await
            .unwrap();

        let hit: Option<Vec<Record>> = cache.get("main", "users", 1, SQL, Some(&params)).await.unwrap();
        assert_eq!(hit, Some(vec![row(42)]));
    }

    #[tokio::test]
    async fn test_get_unseen_is_none() {
        let cache = enabled_cache();
        let miss: Option<CacheEntry> = cache.get("main", "users", 1, SQL, None).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_remove_then_get() {
        let cache = enabled_cache();
        let params = [SqlValue::Int(7)];
        cache.add("main", "users", 1, SQL, Some(&params), row(7)).await.unwrap();
        cache.remove("main", "users", 1, SQL, Some(&params)).await.unwrap();

        let miss: Option<Record> = cache.get("main", "users", 1, SQL, Some(&params)).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_add_expiring() {
        let cache = enabled_cache();
        cache
            .add_expiring("main", "users", 1, SQL, None, row(1), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(cache.get::<Record>("main", "users", 1, SQL, None).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get::<Record>("main", "users", 1, SQL, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_a_miss() {
        let cache = enabled_cache();
        cache.add("main", "users", 1, "SELECT count(*) FROM users", None, 10u64).await.unwrap();

        let wrong: Option<Vec<Record>> = cache
            .get("main", "users", 1, "SELECT count(*) FROM users", None)
            .await
            .unwrap();
        assert!(wrong.is_none());

        let right: Option<u64> = cache
            .get("main", "users", 1, "SELECT count(*) FROM users", None)
            .await
            .unwrap();
        assert_eq!(right, Some(10));
    }

    #[tokio::test]
    async fn test_purge_and_version_bump() {
        let cache = enabled_cache();
        let params = [SqlValue::Int(42)];

        cache.add("main", "users", 1, SQL, Some(&params), vec![row(42)]).await.unwrap();
        cache.purge("main", "users", 1).await.unwrap();
        let gone: Option<Vec<Record>> = cache.get("main", "users", 1, SQL, Some(&params)).await.unwrap();
        assert!(gone.is_none());

        cache.add("main", "users", 2, SQL, Some(&params), vec![row(43)]).await.unwrap();
        let fresh: Option<Vec<Record>> = cache.get("main", "users", 2, SQL, Some(&params)).await.unwrap();
        assert_eq!(fresh, Some(vec![row(43)]));
    }

    #[tokio::test]
    async fn test_disabled_cache_is_inert() {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = QueryCache::new(Arc::clone(&backend), false);
        assert!(!cache.is_enabled());

        cache.add("main", "users", 1, SQL, None, 1u64).await.unwrap();
        let miss: Option<u64> = cache.get("main", "users", 1, SQL, None).await.unwrap();
        assert!(miss.is_none());
        cache.remove("main", "users", 1, SQL, None).await.unwrap();
        cache.purge("main", "users", 1).await.unwrap();

        assert_eq!(backend.stats().await.unwrap(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_contract_violations_rejected() {
        let cache = enabled_cache();
        let err = cache.add("main", "", 1, SQL, None, 1u64).await.unwrap_err();
        assert_eq!(err, QueryCacheError::Validation(ValidationError::missing("table")));

        let err = cache.get::<u64>("main", "users", 1, "", None).await.unwrap_err();
        assert_eq!(err, QueryCacheError::Validation(ValidationError::missing("query")));

        let err = cache.purge("main", "", 1).await.unwrap_err();
        assert!(matches!(err, QueryCacheError::Validation(_)));
    }

    #[tokio::test]
    async fn test_contract_violations_rejected_when_disabled() {
        let cache = QueryCache::new(Arc::new(InMemoryCacheBackend::new()), false);
        assert!(cache.remove("main", "users", 1, "", None).await.is_err());
    }

    #[test]
    fn test_origin_tag() {
        assert!(QueryCache::<InMemoryCacheBackend>::ORIGIN.ends_with("facade::QueryCache"));
    }

    #[tokio::test]
    async fn test_clone_shares_backend() {
        let cache = enabled_cache();
        let clone = cache.clone();
        cache.add("main", "users", 1, SQL, None, 3u64).await.unwrap();
        let hit: Option<u64> = clone.get("main", "users", 1, SQL, None).await.unwrap();
        assert_eq!(hit, Some(3));
    }
}
