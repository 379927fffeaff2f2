//! Versioned query-result cache.
//!
//! This module provides the [`QueryCache`] facade used by the persistence
//! layer, the key scheme it derives identities with, and the backends it can
//! sit on.
//!
//! # Design Philosophy
//!
//! Cache identity carries the table version. Invalidating everything cached
//! for a table never enumerates keys: the caller bumps the version, so every
//! old key becomes unreachable at once, and [`QueryCache::purge`] tells the
//! backend it may drop the old group.
//!
//! ```text
//! group = (ds_name, table, version)       "4:main#5:users#1"
//! key   = (group, query, params)          "4:main#5:users#1#30:SELECT ...#[i:42]"
//! ```
//!
//! # Example
//!
//! ```ignore
//! let cache = build_query_cache(&QueryCacheConfig::from_env()?)?;
//!
//! let params = [SqlValue::Int(42)];
//! if let Some(rows) = cache.get::<Vec<Record>>("main", "users", v, sql, Some(&params)).await? {
//!     return Ok(rows);
//! }
//! let rows = db.query(sql, &params).await?;
//! cache.add("main", "users", v, sql, Some(&params), rows.clone()).await?;
//! ```

pub mod access_log;
pub mod configured;
pub mod facade;
pub mod key;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod table_scope;
pub mod traits;

pub use access_log::{log_access, Access};
pub use configured::{build_query_cache, ConfiguredBackend};
pub use facade::QueryCache;
pub use key::{render_params, CacheGroup, CacheKey, NULL_PARAMS};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory_backend::InMemoryCacheBackend;
pub use table_scope::TableCache;
pub use traits::{CacheBackend, CacheEvent, CacheStats};
