//! Configuration for the query cache.
//!
//! Loaded once at process start, either from `QUERYCACHE_*` environment
//! variables or from a TOML file. The `enabled` switch is never toggled at
//! runtime.

use crate::error::{CacheResult, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ENABLED: &str = "QUERYCACHE_ENABLED";
pub const ENV_BACKEND: &str = "QUERYCACHE_BACKEND";
pub const ENV_LMDB_PATH: &str = "QUERYCACHE_LMDB_PATH";
pub const ENV_LMDB_MAX_SIZE_MB: &str = "QUERYCACHE_LMDB_MAX_SIZE_MB";
pub const ENV_TTL_SECS: &str = "QUERYCACHE_TTL_SECS";
pub const ENV_MAX_ENTRIES_PER_GROUP: &str = "QUERYCACHE_MAX_ENTRIES_PER_GROUP";

const DEFAULT_LMDB_MAX_SIZE_MB: usize = 64;

/// Which storage engine backs the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Process-local maps.
    #[default]
    Memory,
    /// Memory-mapped LMDB environment at `path`.
    Lmdb { path: PathBuf, max_size_mb: usize },
}

/// Master cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryCacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Entry lifetime in seconds; `None` keeps entries until flushed.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Upper bound on entries held for one cache group.
    #[serde(default)]
    pub max_entries_per_group: Option<usize>,
}

fn default_enabled() -> bool {
    true
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: BackendConfig::default(),
            ttl_secs: None,
            max_entries_per_group: None,
        }
    }
}

impl QueryCacheConfig {
    /// Build from `QUERYCACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = match lookup(ENV_ENABLED) {
            Some(raw) => parse_bool(ENV_ENABLED, &raw)?,
            None => true,
        };

        let backend = match lookup(ENV_BACKEND).as_deref().map(str::trim) {
            None | Some("") | Some("memory") => BackendConfig::Memory,
            Some("lmdb") => {
                let path = lookup(ENV_LMDB_PATH).ok_or_else(|| ConfigError::MissingRequired {
                    field: ENV_LMDB_PATH.to_string(),
                })?;
                let max_size_mb = match lookup(ENV_LMDB_MAX_SIZE_MB) {
                    Some(raw) => parse_number(ENV_LMDB_MAX_SIZE_MB, &raw)?,
                    None => DEFAULT_LMDB_MAX_SIZE_MB,
                };
                BackendConfig::Lmdb {
                    path: PathBuf::from(path),
                    max_size_mb,
                }
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: ENV_BACKEND.to_string(),
                    value: other.to_string(),
                    reason: "expected memory or lmdb".to_string(),
                }
                .into())
            }
        };

        let ttl_secs = lookup(ENV_TTL_SECS)
            .map(|raw| parse_number(ENV_TTL_SECS, &raw))
            .transpose()?;
        let max_entries_per_group = lookup(ENV_MAX_ENTRIES_PER_GROUP)
            .map(|raw| parse_number(ENV_MAX_ENTRIES_PER_GROUP, &raw))
            .transpose()?;

        let config = Self {
            enabled,
            backend,
            ttl_secs,
            max_entries_per_group,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_path(path: &Path) -> CacheResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> CacheResult<Self> {
        let config: QueryCacheConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CacheResult<()> {
        if let BackendConfig::Lmdb { path, max_size_mb } = &self.backend {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: "backend.path".to_string(),
                }
                .into());
            }
            if *max_size_mb == 0 {
                return Err(invalid("backend.max_size_mb", "0", "must be > 0").into());
            }
        }
        if self.ttl_secs == Some(0) {
            return Err(invalid("ttl_secs", "0", "must be > 0").into());
        }
        if self.max_entries_per_group == Some(0) {
            return Err(invalid("max_entries_per_group", "0", "must be > 0").into());
        }
        Ok(())
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(field, raw, "expected a boolean")),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(field, raw, "expected a non-negative integer"))
}
