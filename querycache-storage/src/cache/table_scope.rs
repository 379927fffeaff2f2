//! Table-scoped view over the query cache.

use querycache_core::{CacheEntry, CacheResult, FromCacheEntry, SqlValue, TableMeta, TableVersion};

use super::facade::QueryCache;
use super::key::{CacheGroup, CacheKey};
use super::traits::CacheBackend;

/// [`QueryCache`] bound to one table's metadata.
///
/// Fills in `ds_name` and `table` from the [`TableMeta`], and turns every
/// operation into a no-op when the table has not opted into caching. Arguments
/// are validated either way.
pub struct TableCache<'a, B>
where
    B: CacheBackend,
{
    cache: &'a QueryCache<B>,
    meta: &'a TableMeta,
}

impl<'a, B> TableCache<'a, B>
where
    B: CacheBackend,
{
    pub(crate) fn new(cache: &'a QueryCache<B>, meta: &'a TableMeta) -> Self {
        Self { cache, meta }
    }

    pub fn meta(&self) -> &TableMeta {
        self.meta
    }

    /// Rejects the same arguments the facade would, without touching it.
    fn check(
        &self,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
    ) -> CacheResult<()> {
        let group = CacheGroup::new(self.meta.ds_name(), self.meta.table_name(), version)?;
        CacheKey::new(&group, query, params).map(|_| ())
    }

    /// Whether reads and writes through this view reach the backend.
    pub fn is_active(&self) -> bool {
        self.meta.is_cached() && self.cache.is_enabled()
    }

    pub async fn add(
        &self,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
        value: impl Into<CacheEntry>,
    ) -> CacheResult<()> {
        if !self.meta.is_cached() {
            return self.check(version, query, params);
        }
        let (ds_name, table) = (self.meta.ds_name(), self.meta.table_name());
        match self.meta.expired() {
            Some(ttl) => {
                self.cache
                    .add_expiring(ds_name, table, version, query, params, value, ttl)
                    .await
            }
            None => self.cache.add(ds_name, table, version, query, params, value).await,
        }
    }

    pub async fn get<T>(
        &self,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
    ) -> CacheResult<Option<T>>
    where
        T: FromCacheEntry,
    {
        if !self.meta.is_cached() {
            return self.check(version, query, params).map(|_| None);
        }
        self.cache
            .get(self.meta.ds_name(), self.meta.table_name(), version, query, params)
            .await
    }

    pub async fn remove(
        &self,
        version: TableVersion,
        query: &str,
        params: Option<&[SqlValue]>,
    ) -> CacheResult<()> {
        if !self.meta.is_cached() {
            return self.check(version, query, params);
        }
        self.cache
            .remove(self.meta.ds_name(), self.meta.table_name(), version, query, params)
            .await
    }

    pub async fn purge(&self, version: TableVersion) -> CacheResult<()> {
        if !self.meta.is_cached() {
            return CacheGroup::new(self.meta.ds_name(), self.meta.table_name(), version)
                .map(|_| ());
        }
        self.cache
            .purge(self.meta.ds_name(), self.meta.table_name(), version)
            .await
    }
}
