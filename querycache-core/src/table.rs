//! Table cache policy supplied by the metadata layer.

use crate::error::{CacheResult, ValidationError};
use std::time::Duration;

/// Data source name used when a table does not name one.
pub const DEFAULT_DS_NAME: &str = "default";

/// Per-table caching policy.
///
/// Owned by the schema/metadata layer. The cache facade itself never consults
/// it; callers (or the table-scoped view in `querycache-storage`) use it to
/// decide whether to touch the cache at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    ds_name: String,
    table_name: String,
    primary_key: Vec<String>,
    cached: bool,
    expired: Option<Duration>,
}

impl TableMeta {
    /// Describe a table on the default data source. Caching is off until
    /// enabled with [`TableMeta::with_cached`].
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            ds_name: DEFAULT_DS_NAME.to_string(),
            table_name: table_name.into(),
            primary_key: vec!["id".to_string()],
            cached: false,
            expired: None,
        }
    }

    pub fn with_ds_name(mut self, ds_name: impl Into<String>) -> Self {
        self.ds_name = ds_name.into();
        self
    }

    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Expiry hint for backends that honor one.
    pub fn with_expired(mut self, expired: Duration) -> Self {
        self.expired = Some(expired);
        self
    }

    pub fn ds_name(&self) -> &str {
        &self.ds_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn expired(&self) -> Option<Duration> {
        self.expired
    }

    /// Reject metadata the cache cannot key on.
    pub fn validate(&self) -> CacheResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(ValidationError::missing("table_name").into());
        }
        if self.primary_key.iter().any(|c| c.trim().is_empty()) {
            return Err(ValidationError::InvalidValue {
                field: "primary_key".to_string(),
                reason: "column names must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
