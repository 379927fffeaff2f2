//! Debug-level access logging for cache operations.
//!
//! Nothing here affects cached state or return values. When DEBUG is disabled
//! for [`LOG_TARGET`] the function returns before any formatting happens.

use std::fmt;

use querycache_core::SqlValue;
use tracing::Level;

use super::key::CacheGroup;

/// `tracing` target for access events.
pub const LOG_TARGET: &str = "querycache::access";

/// What happened to a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hit,
    Miss,
    Store,
    Remove,
    Purge,
}

impl Access {
    pub fn as_str(self) -> &'static str {
        match self {
            Access::Hit => "Hit",
            Access::Miss => "Miss",
            Access::Store => "Store",
            Access::Remove => "Remove",
            Access::Purge => "Purge",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lazy rendering of a parameter list as `{a}, {b}`.
///
/// Only formatted if a subscriber actually records the field.
pub struct ParamsDisplay<'a>(pub Option<&'a [SqlValue]>);

impl fmt::Display for ParamsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(params) = self.0 else {
            return f.write_str("null");
        };
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{{{}}}", param)?;
        }
        Ok(())
    }
}

/// Record one cache access at DEBUG level.
pub fn log_access(
    group: &CacheGroup,
    query: Option<&str>,
    params: Option<&[SqlValue]>,
    access: Access,
) {
    if !tracing::enabled!(target: LOG_TARGET, Level::DEBUG) {
        return;
    }

    match query {
        Some(query) => tracing::debug!(
            target: LOG_TARGET,
            access = access.as_str(),
            group = %group,
            query,
            params = %ParamsDisplay(params),
            "query cache access"
        ),
        None => tracing::debug!(
            target: LOG_TARGET,
            access = access.as_str(),
            group = %group,
            "query cache access"
        ),
    }
}
