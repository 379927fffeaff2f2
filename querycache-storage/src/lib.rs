//! querycache Storage - Cache Facade and Backends
//!
//! Decides whether a previously computed query result may be reused, and
//! invalidates a table's cached results in O(1) by versioning the cache group.

pub mod cache;

pub use cache::{
    build_query_cache, Access, CacheBackend, CacheEvent, CacheGroup, CacheKey, CacheStats,
    ConfiguredBackend, InMemoryCacheBackend, LmdbCacheBackend, LmdbCacheError, QueryCache,
    TableCache,
};

// Re-export core types for convenience
pub use querycache_core::{
    BackendConfig, CacheEntry, CacheResult, FromCacheEntry, QueryCacheConfig, QueryCacheError,
    Record, SqlValue, TableMeta, TableVersion,
};
