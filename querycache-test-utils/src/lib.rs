//! querycache Test Utilities
//!
//! Shared test infrastructure for the querycache workspace:
//! - Proptest generators for keys, parameters and payloads
//! - Instrumented backends for asserting facade behavior
//! - Fixtures for common table scenarios
//! - Log capture for access-log assertions

pub mod generators;

pub use querycache_storage::{
    CacheBackend, CacheEvent, CacheGroup, CacheKey, CacheStats, InMemoryCacheBackend, QueryCache,
};

pub use querycache_core::{
    BackendError, CacheEntry, CacheResult, QueryCacheError, Record, SqlValue, TableMeta,
    TableVersion,
};

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

// ============================================================================
// INSTRUMENTED BACKENDS
// ============================================================================

/// Per-operation call counts recorded by [`CountingBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCalls {
    pub store: u64,
    pub fetch: u64,
    pub remove: u64,
    pub flush: u64,
}

impl BackendCalls {
    pub fn total(&self) -> u64 {
        self.store + self.fetch + self.remove + self.flush
    }
}

/// In-memory backend that counts every call made to it.
#[derive(Default)]
pub struct CountingBackend {
    inner: InMemoryCacheBackend,
    store: AtomicU64,
    fetch: AtomicU64,
    remove: AtomicU64,
    flush: AtomicU64,
    flushed_groups: Mutex<Vec<String>>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryCacheBackend {
        &self.inner
    }

    pub fn calls(&self) -> BackendCalls {
        BackendCalls {
            store: self.store.load(Ordering::SeqCst),
            fetch: self.fetch.load(Ordering::SeqCst),
            remove: self.remove.load(Ordering::SeqCst),
            flush: self.flush.load(Ordering::SeqCst),
        }
    }

    /// Groups named by flush events, in arrival order.
    pub fn flushed_groups(&self) -> Vec<String> {
        self.flushed_groups
            .lock()
            .map(|groups| groups.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CacheBackend for CountingBackend {
    async fn store(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> CacheResult<()> {
        self.store.fetch_add(1, Ordering::SeqCst);
        self.inner.store(group, key, entry).await
    }

    async fn store_expiring(
        &self,
        group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.store.fetch_add(1, Ordering::SeqCst);
        self.inner.store_expiring(group, key, entry, ttl).await
    }

    async fn fetch(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        self.fetch.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(group, key).await
    }

    async fn remove(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<()> {
        self.remove.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(group, key).await
    }

    async fn flush(&self, event: &CacheEvent) -> CacheResult<u64> {
        self.flush.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut groups) = self.flushed_groups.lock() {
            groups.push(event.group().as_str().to_string());
        }
        self.inner.flush(event).await
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        self.inner.stats().await
    }
}

/// Backend whose every operation fails with a transaction error.
#[derive(Debug, Default)]
pub struct FailingBackend;

impl FailingBackend {
    fn error(op: &str) -> QueryCacheError {
        BackendError::Transaction {
            reason: format!("{} rejected by failing backend", op),
        }
        .into()
    }
}

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn store(&self, _: &CacheGroup, _: &CacheKey, _: CacheEntry) -> CacheResult<()> {
        Err(Self::error("store"))
    }

    async fn fetch(&self, _: &CacheGroup, _: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        Err(Self::error("fetch"))
    }

    async fn remove(&self, _: &CacheGroup, _: &CacheKey) -> CacheResult<()> {
        Err(Self::error("remove"))
    }

    async fn flush(&self, _: &CacheEvent) -> CacheResult<u64> {
        Err(Self::error("flush"))
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        Err(Self::error("stats"))
    }
}

/// Enabled facade over a fresh [`CountingBackend`].
pub fn counting_cache() -> (QueryCache<CountingBackend>, Arc<CountingBackend>) {
    let backend = Arc::new(CountingBackend::new());
    (QueryCache::new(Arc::clone(&backend), true), backend)
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Canned tables and rows.

    use super::*;

    /// `main.users`, opted into caching.
    pub fn users_table() -> TableMeta {
        TableMeta::new("users").with_ds_name("main").with_cached(true)
    }

    /// `main.audit_log`, left at the default (not cached).
    pub fn uncached_table() -> TableMeta {
        TableMeta::new("audit_log").with_ds_name("main")
    }

    pub fn user_record(id: i64, name: &str) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), SqlValue::Int(id));
        record.insert("name".to_string(), SqlValue::Text(name.to_string()));
        record
    }

    pub fn sample_rowset() -> Vec<Record> {
        vec![user_record(1, "ada"), user_record(2, "grace"), user_record(42, "alan")]
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-writer subscriber once; honours `RUST_LOG`.
pub fn init_test_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("querycache=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// In-memory sink for formatted log output.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Subscriber writing plain text into this sink at `level` and above.
    pub fn subscriber(&self, level: Level) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        self.buf
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

pub struct CapturedWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .buf
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log buffer poisoned"))?;
        buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}
