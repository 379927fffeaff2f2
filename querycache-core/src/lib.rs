//! querycache Core - Data Types
//!
//! Pure data structures shared by the cache facade, its backends and callers.
//! This crate contains no cache logic.

use chrono::{DateTime, Utc};

pub mod config;
pub mod error;
pub mod table;
pub mod value;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Monotonic per-table version number supplied by the persistence layer.
pub type TableVersion = u64;

pub use config::{BackendConfig, QueryCacheConfig};
pub use error::{BackendError, CacheResult, ConfigError, QueryCacheError, ValidationError};
pub use table::{TableMeta, DEFAULT_DS_NAME};
pub use value::{CacheEntry, FromCacheEntry, Record, SqlValue};
