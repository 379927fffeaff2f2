//! Error types for querycache operations

use thiserror::Error;

/// Caller-contract violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization failed: {reason}")]
    Deserialization { reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {reason}")]
    Io { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },
}

/// Master error type for all querycache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryCacheError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for querycache operations.
pub type CacheResult<T> = Result<T, QueryCacheError>;

impl ValidationError {
    /// Shorthand for a missing or empty required argument.
    pub fn missing(field: &str) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_missing() {
        let err = ValidationError::missing("table");
        let msg = format!("{}", err);
        assert!(msg.contains("Required field missing"));
        assert!(msg.contains("table"));
    }

    #[test]
    fn test_backend_error_display_transaction() {
        let err = BackendError::Transaction {
            reason: "map full".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Transaction failed"));
        assert!(msg.contains("map full"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "QUERYCACHE_BACKEND".to_string(),
            value: "redis".to_string(),
            reason: "expected memory or lmdb".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("QUERYCACHE_BACKEND"));
        assert!(msg.contains("redis"));
        assert!(msg.contains("expected memory or lmdb"));
    }

    #[test]
    fn test_backend_error_display_lock_poisoned() {
        let msg = format!("{}", BackendError::LockPoisoned);
        assert!(msg.contains("lock poisoned"));
    }

    #[test]
    fn test_query_cache_error_from_variants() {
        let validation = QueryCacheError::from(ValidationError::missing("query"));
        assert!(matches!(validation, QueryCacheError::Validation(_)));

        let backend = QueryCacheError::from(BackendError::LockPoisoned);
        assert!(matches!(backend, QueryCacheError::Backend(_)));

        let config = QueryCacheError::from(ConfigError::MissingRequired {
            field: "lmdb.path".to_string(),
        });
        assert!(matches!(config, QueryCacheError::Config(_)));
    }
}
