//! LMDB-backed cache implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! persistent key-value store for cached query results.
//!
//! # Layout
//!
//! Keys are `[sha256(group): 32 bytes][sha256(key): 32 bytes]`. LMDB caps keys
//! at 511 bytes, and rendered keys carry the whole SQL text, so they are never
//! stored as-is. Every key of a group starts with the same 32-byte digest, and
//! flushing a group is one prefix scan inside a single write transaction.
//!
//! Values are `[cached_at millis: 8 bytes LE][ttl millis: 8 bytes LE][CacheEntry as JSON]`.
//! A zero ttl means the entry only expires by the backend-wide TTL.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `fetch`
//! - Write transactions for `store`, `remove` and `flush`
//! - Statistics are tracked behind `RwLock`s

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use querycache_core::{BackendError, CacheEntry, CacheResult, QueryCacheError};
use sha2::{Digest, Sha256};

use super::key::{CacheGroup, CacheKey};
use super::traits::{CacheBackend, CacheEvent, CacheStats};

/// Length of the timestamp + ttl header in front of every value.
const HEADER_LEN: usize = 16;

const DIGEST_LEN: usize = 32;

/// Stored key length: group digest followed by key digest.
const STORED_KEY_LEN: usize = DIGEST_LEN * 2;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for QueryCacheError {
    fn from(e: LmdbCacheError) -> Self {
        let backend = match e {
            LmdbCacheError::Serialization(reason) => BackendError::Serialization { reason },
            LmdbCacheError::Deserialization(reason) => BackendError::Deserialization { reason },
            LmdbCacheError::Io(err) => BackendError::Io {
                reason: err.to_string(),
            },
            other => BackendError::Transaction {
                reason: other.to_string(),
            },
        };
        QueryCacheError::Backend(backend)
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

fn sha256(text: &str) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Scan prefix shared by every stored key of `group`.
fn group_prefix(group: &CacheGroup) -> [u8; DIGEST_LEN] {
    sha256(group.as_str())
}

/// Fixed-size stored form of `key`.
fn stored_key(key: &CacheKey) -> [u8; STORED_KEY_LEN] {
    let mut stored = [0u8; STORED_KEY_LEN];
    stored[..DIGEST_LEN].copy_from_slice(&sha256(key.group_str()));
    stored[DIGEST_LEN..].copy_from_slice(&sha256(key.as_str()));
    stored
}

/// Per-group statistics tracking.
#[derive(Debug, Default)]
struct GroupStatsInner {
    hits: u64,
    misses: u64,
}

/// LMDB-backed cache.
///
/// # Example
///
/// ```ignore
/// use querycache_storage::{LmdbCacheBackend, QueryCache};
///
/// let backend = LmdbCacheBackend::new("/var/cache/querycache", 64)?;
/// let cache = QueryCache::shared(Arc::new(backend), true);
/// ```
pub struct LmdbCacheBackend {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Entries older than this read as misses.
    ttl: Option<Duration>,
    /// Per-group statistics.
    group_stats: RwLock<HashMap<String, GroupStatsInner>>,
    /// Global statistics.
    global_stats: RwLock<CacheStats>,
}

impl LmdbCacheBackend {
    /// Open (or create) the environment under `path` with a map of
    /// `max_size_mb` megabytes.
    ///
    /// Fails with [`LmdbCacheError::EnvOpen`] when the map size does not fit
    /// in `usize` bytes or LMDB refuses the environment.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        let map_size = max_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbCacheError::EnvOpen(format!("map size of {max_size_mb} MB overflows usize"))
        })?;
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        tracing::info!(
            path = %path.as_ref().display(),
            max_size_mb,
            "LMDB query cache opened"
        );

        Ok(Self {
            env,
            db,
            ttl: None,
            group_stats: RwLock::new(HashMap::new()),
            global_stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Entries older than `ttl` read as misses and are deleted on access.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Hit/miss counters and live entry count for one group.
    pub fn group_stats(&self, group: &CacheGroup) -> CacheStats {
        let counters = self
            .group_stats
            .read()
            .ok()
            .and_then(|stats| {
                stats
                    .get(group.as_str())
                    .map(|s| (s.hits, s.misses))
            });
        let entry_count = self
            .count_with_prefix(&group_prefix(group))
            .unwrap_or(0);

        match counters {
            Some((hits, misses)) => CacheStats {
                hits,
                misses,
                entry_count,
                ..Default::default()
            },
            None => CacheStats {
                entry_count,
                ..Default::default()
            },
        }
    }

    fn record_hit(&self, group: &CacheGroup) {
        if let Ok(mut stats) = self.group_stats.write() {
            stats.entry(group.as_str().to_string()).or_default().hits += 1;
        }
        if let Ok(mut stats) = self.global_stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self, group: &CacheGroup, evicted: bool) {
        if let Ok(mut stats) = self.group_stats.write() {
            stats.entry(group.as_str().to_string()).or_default().misses += 1;
        }
        if let Ok(mut stats) = self.global_stats.write() {
            stats.misses += 1;
            if evicted {
                stats.evictions += 1;
            }
        }
    }

    fn count_with_prefix(&self, prefix: &[u8]) -> Result<u64, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let mut count = 0u64;
        for result in self.db.prefix_iter(&rtxn, prefix).map_err(txn_err)? {
            result.map_err(txn_err)?;
            count += 1;
        }
        Ok(count)
    }

    fn encode_value(
        entry: &CacheEntry,
        cached_at: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Result<Vec<u8>, LmdbCacheError> {
        let json =
            serde_json::to_vec(entry).map_err(|e| LmdbCacheError::Serialization(e.to_string()))?;
        let ttl_millis = ttl
            .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
            .unwrap_or(0);
        let mut bytes = Vec::with_capacity(HEADER_LEN + json.len());
        bytes.extend_from_slice(&cached_at.timestamp_millis().to_le_bytes());
        bytes.extend_from_slice(&ttl_millis.to_le_bytes());
        bytes.extend_from_slice(&json);
        Ok(bytes)
    }

    fn decode_value(bytes: &[u8]) -> Result<StoredValue, LmdbCacheError> {
        if bytes.len() < HEADER_LEN {
            return Err(LmdbCacheError::Deserialization(
                "value shorter than header".into(),
            ));
        }
        let (cached_at, ttl) = bytes[..HEADER_LEN].split_at(8);
        let cached_at: [u8; 8] = cached_at
            .try_into()
            .map_err(|_| LmdbCacheError::Deserialization("Invalid timestamp".into()))?;
        let ttl: [u8; 8] = ttl
            .try_into()
            .map_err(|_| LmdbCacheError::Deserialization("Invalid ttl".into()))?;

        let cached_at = DateTime::from_timestamp_millis(i64::from_le_bytes(cached_at))
            .ok_or_else(|| LmdbCacheError::Deserialization("timestamp out of range".into()))?;
        let ttl = match u64::from_le_bytes(ttl) {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        };
        let entry: CacheEntry = serde_json::from_slice(&bytes[HEADER_LEN..])
            .map_err(|e| LmdbCacheError::Deserialization(e.to_string()))?;
        Ok(StoredValue {
            entry,
            cached_at,
            ttl,
        })
    }

    fn is_expired(&self, value: &StoredValue) -> bool {
        let Some(ttl) = value.ttl.or(self.ttl) else {
            return false;
        };
        let cached_at = value.cached_at;
        Utc::now()
            .signed_duration_since(cached_at)
            .to_std()
            .map(|age| age >= ttl)
            .unwrap_or(false)
    }

    fn delete_key(&self, key: &[u8]) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let deleted = self.db.delete(&mut wtxn, key).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    fn put(&self, key: &CacheKey, entry: &CacheEntry, ttl: Option<Duration>) -> CacheResult<()> {
        let bytes = Self::encode_value(entry, Utc::now(), ttl)?;

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, stored_key(key).as_slice(), &bytes)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }
}

/// Decoded value bytes.
#[derive(Debug)]
struct StoredValue {
    entry: CacheEntry,
    cached_at: DateTime<Utc>,
    ttl: Option<Duration>,
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn store(
        &self,
        _group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> CacheResult<()> {
        self.put(key, &entry, None)
    }

    async fn store_expiring(
        &self,
        _group: &CacheGroup,
        key: &CacheKey,
        entry: CacheEntry,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.put(key, &entry, Some(ttl))
    }

    async fn fetch(&self, group: &CacheGroup, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let decoded = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            match self.db.get(&rtxn, stored_key(key).as_slice()) {
                Ok(Some(bytes)) => Some(Self::decode_value(bytes)?),
                Ok(None) => None,
                Err(e) => {
                    self.record_miss(group, false);
                    return Err(txn_err(e).into());
                }
            }
        };

        match decoded {
            Some(value) if !self.is_expired(&value) => {
                self.record_hit(group);
                Ok(Some(value.entry))
            }
            Some(_) => {
                let evicted = self.delete_key(&stored_key(key))?;
                self.record_miss(group, evicted);
                Ok(None)
            }
            None => {
                self.record_miss(group, false);
                Ok(None)
            }
        }
    }

    async fn remove(&self, _group: &CacheGroup, key: &CacheKey) -> CacheResult<()> {
        self.delete_key(&stored_key(key))?;
        Ok(())
    }

    async fn flush(&self, event: &CacheEvent) -> CacheResult<u64> {
        let prefix = group_prefix(event.group());

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let keys: Vec<Vec<u8>> = {
            let mut keys = Vec::new();
            for result in self
                .db
                .prefix_iter(&wtxn, prefix.as_slice())
                .map_err(txn_err)?
            {
                let (key, _) = result.map_err(txn_err)?;
                keys.push(key.to_vec());
            }
            keys
        };

        let mut deleted = 0u64;
        for key in &keys {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;

        if let Ok(mut stats) = self.group_stats.write() {
            stats.remove(event.group().as_str());
        }
        if let Ok(mut stats) = self.global_stats.write() {
            stats.flushes += 1;
        }

        tracing::debug!(
            group = %event.group(),
            origin = event.origin(),
            deleted,
            "LMDB cache group flushed"
        );
        Ok(deleted)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let (entry_count, memory_bytes) = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let mut count = 0u64;
            let mut bytes = 0u64;
            for result in self.db.iter(&rtxn).map_err(txn_err)? {
                let (_, value) = result.map_err(txn_err)?;
                count += 1;
                bytes += value.len() as u64;
            }
            (count, bytes)
        };

        let stats = self
            .global_stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        Ok(CacheStats {
            entry_count,
            memory_bytes,
            ..stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querycache_core::{Record, SqlValue};
    use tempfile::TempDir;

    fn create_test_backend() -> (LmdbCacheBackend, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let backend =
            LmdbCacheBackend::new(temp_dir.path(), 10).expect("backend creation should succeed");
        (backend, temp_dir)
    }

    fn group(table: &str, version: u64) -> CacheGroup {
        CacheGroup::new("main", table, version).expect("group should derive")
    }

    fn key(group: &CacheGroup, id: i64) -> CacheKey {
        CacheKey::new(group, "SELECT * FROM t WHERE id=?", Some(&[SqlValue::Int(id)]))
            .expect("key should derive")
    }

    fn rowset(id: i64) -> CacheEntry {
        let mut row = Record::new();
        row.insert("id".to_string(), SqlValue::Int(id));
        row.insert("name".to_string(), SqlValue::from(format!("user-{id}")));
        CacheEntry::Records(vec![row])
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let (backend, _temp_dir) = create_test_backend();
        let g = group("users", 1);

        backend
            .store(&g, &key(&g, 42), rowset(42))
            .await
            .expect("store should succeed");

        let cached = backend
            .fetch(&g, &key(&g, 42))
            .await
            .expect("fetch should succeed");
        assert_eq!(cached, Some(rowset(42)));
    }

    #[tokio::test]
    async fn test_fetch_nonexistent() {
        let (backend, _temp_dir) = create_test_backend();
        let g = group("users", 1);

        let cached = backend
            .fetch(&g, &key(&g, 1))
            .await
            .expect("fetch should succeed");
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let (backend, _temp_dir) = create_test_backend();
        let g = group("users", 1);

        backend.store(&g, &key(&g, 1), rowset(1)).await.expect("store should succeed");
        backend.remove(&g, &key(&g, 1)).await.expect("remove should succeed");
        backend.remove(&g, &key(&g, 1)).await.expect("second remove is a no-op");

        assert!(backend
            .fetch(&g, &key(&g, 1))
            .await
            .expect("fetch should succeed")
            .is_none());
    }

    #[tokio::test]
    async fn test_flush_only_touches_its_group() {
        let (backend, _temp_dir) = create_test_backend();
        let users_v1 = group("users", 1);
        let users_v12 = group("users", 12);
        let orders_v1 = group("orders", 1);

        for id in 0..5 {
            backend
                .store(&users_v1, &key(&users_v1, id), rowset(id))
                .await
                .expect("store should succeed");
        }
        backend
            .store(&users_v12, &key(&users_v12, 0), rowset(0))
            .await
            .expect("store should succeed");
        backend
            .store(&orders_v1, &key(&orders_v1, 0), rowset(0))
            .await
            .expect("store should succeed");

        let deleted = backend
            .flush(&CacheEvent::new(users_v1.clone(), "test"))
            .await
            .expect("flush should succeed");
        assert_eq!(deleted, 5);

        assert!(backend.fetch(&users_v1, &key(&users_v1, 0)).await.unwrap().is_none());
        assert!(backend.fetch(&users_v12, &key(&users_v12, 0)).await.unwrap().is_some());
        assert!(backend.fetch(&orders_v1, &key(&orders_v1, 0)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let (backend, _temp_dir) = create_test_backend();
        let g = group("users", 1);

        backend.store(&g, &key(&g, 1), rowset(1)).await.expect("store should succeed");
        backend.store(&g, &key(&g, 1), rowset(2)).await.expect("store should succeed");

        let cached = backend.fetch(&g, &key(&g, 1)).await.expect("fetch should succeed");
        assert_eq!(cached, Some(rowset(2)));
        assert_eq!(backend.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let backend = LmdbCacheBackend::new(temp_dir.path(), 10)
            .expect("backend creation should succeed")
            .with_ttl(Duration::from_millis(20));
        let g = group("users", 1);

        backend.store(&g, &key(&g, 1), rowset(1)).await.expect("store should succeed");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(backend.fetch(&g, &key(&g, 1)).await.unwrap().is_none());
        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let (backend, _temp_dir) = create_test_backend();
        let g = group("users", 1);

        let _ = backend.fetch(&g, &key(&g, 1)).await;
        backend.store(&g, &key(&g, 1), rowset(1)).await.expect("store should succeed");
        let _ = backend.fetch(&g, &key(&g, 1)).await;
        let _ = backend.fetch(&g, &key(&g, 1)).await;

        let stats = backend.stats().await.expect("stats should succeed");
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entry_count, 1);
        assert!(stats.memory_bytes > HEADER_LEN as u64);
    }

    #[tokio::test]
    async fn test_group_stats() {
        let (backend, _temp_dir) = create_test_backend();
        let users = group("users", 1);
        let orders = group("orders", 1);

        backend.store(&users, &key(&users, 1), rowset(1)).await.unwrap();
        for _ in 0..3 {
            let _ = backend.fetch(&users, &key(&users, 1)).await;
        }
        let _ = backend.fetch(&orders, &key(&orders, 1)).await;
        let _ = backend.fetch(&orders, &key(&orders, 2)).await;

        let users_stats = backend.group_stats(&users);
        let orders_stats = backend.group_stats(&orders);
        assert_eq!(users_stats.hits, 3);
        assert_eq!(users_stats.misses, 0);
        assert_eq!(users_stats.entry_count, 1);
        assert_eq!(orders_stats.hits, 0);
        assert_eq!(orders_stats.misses, 2);

        backend.flush(&CacheEvent::new(users.clone(), "test")).await.unwrap();
        assert_eq!(backend.group_stats(&users), CacheStats::default());
    }

    #[tokio::test]
    async fn test_entry_ttl_overrides_backend_ttl() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let backend = LmdbCacheBackend::new(temp_dir.path(), 10)
            .expect("backend creation should succeed")
            .with_ttl(Duration::from_secs(3600));
        let g = group("users", 1);

        backend
            .store_expiring(&g, &key(&g, 1), rowset(1), Duration::from_millis(20))
            .await
            .expect("store should succeed");
        backend.store(&g, &key(&g, 2), rowset(2)).await.expect("store should succeed");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(backend.fetch(&g, &key(&g, 1)).await.unwrap().is_none());
        assert_eq!(backend.fetch(&g, &key(&g, 2)).await.unwrap(), Some(rowset(2)));
    }

    fn wide_select(columns: usize) -> String {
        let cols: Vec<String> = (0..columns).map(|i| format!("column_number_{i}")).collect();
        format!("SELECT {} FROM wide_table WHERE id=?", cols.join(", "))
    }

    #[tokio::test]
    async fn test_long_keys_round_trip() {
        let (backend, _temp_dir) = create_test_backend();
        let g = group("wide_table", 1);
        let sql = wide_select(60);
        assert!(sql.len() >= 600);
        let params = [
            SqlValue::Text("x".repeat(2048)),
            SqlValue::Bytes(vec![0xab; 1024]),
        ];
        let long_key = CacheKey::new(&g, &sql, Some(&params)).unwrap();
        let short_key = key(&g, 1);

        backend.store(&g, &long_key, rowset(7)).await.expect("store should succeed");
        backend.store(&g, &short_key, rowset(1)).await.expect("store should succeed");
        assert_eq!(backend.fetch(&g, &long_key).await.unwrap(), Some(rowset(7)));

        backend.remove(&g, &long_key).await.expect("remove should succeed");
        assert!(backend.fetch(&g, &long_key).await.unwrap().is_none());

        backend.store(&g, &long_key, rowset(7)).await.unwrap();
        let deleted = backend.flush(&CacheEvent::new(g.clone(), "test")).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(backend.stats().await.unwrap().entry_count, 0);
    }

    #[test]
    fn test_stored_keys_are_fixed_size() {
        let g = group("users", 1);
        let sql = wide_select(200);
        let long = CacheKey::new(&g, &sql, None).unwrap();
        let short = key(&g, 1);

        assert_eq!(stored_key(&long).len(), STORED_KEY_LEN);
        assert_ne!(stored_key(&long), stored_key(&short));
        assert_eq!(stored_key(&long)[..DIGEST_LEN], group_prefix(&g));
        assert_ne!(stored_key(&long)[..DIGEST_LEN], group_prefix(&group("users", 12)));
    }

    #[tokio::test]
    async fn test_non_finite_floats_round_trip() {
        let (backend, _temp_dir) = create_test_backend();
        let g = group("metrics", 1);
        let mut row = Record::new();
        row.insert("ratio".to_string(), SqlValue::Float(f64::NAN));
        row.insert("ceiling".to_string(), SqlValue::Float(f64::INFINITY));
        row.insert("floor".to_string(), SqlValue::Float(f64::NEG_INFINITY));

        backend
            .store(&g, &key(&g, 1), CacheEntry::Record(row))
            .await
            .expect("store should succeed");
        let Some(CacheEntry::Record(back)) = backend.fetch(&g, &key(&g, 1)).await.unwrap() else {
            panic!("expected a record");
        };

        assert!(matches!(back["ratio"], SqlValue::Float(x) if x.is_nan()));
        assert_eq!(back["ceiling"], SqlValue::Float(f64::INFINITY));
        assert_eq!(back["floor"], SqlValue::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_oversized_map_rejected() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let err = LmdbCacheBackend::new(temp_dir.path(), usize::MAX).err().unwrap();
        assert!(matches!(err, LmdbCacheError::EnvOpen(_)));
    }

    #[test]
    fn test_decode_reads_header() {
        let cached_at = Utc::now();
        let bytes = LmdbCacheBackend::encode_value(
            &CacheEntry::Count(3),
            cached_at,
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        let value = LmdbCacheBackend::decode_value(&bytes).unwrap();
        assert_eq!(value.entry, CacheEntry::Count(3));
        assert_eq!(value.cached_at.timestamp_millis(), cached_at.timestamp_millis());
        assert_eq!(value.ttl, Some(Duration::from_secs(5)));

        let bytes = LmdbCacheBackend::encode_value(&CacheEntry::Count(3), cached_at, None).unwrap();
        assert_eq!(LmdbCacheBackend::decode_value(&bytes).unwrap().ttl, None);
    }

    #[test]
    fn test_decode_rejects_short_value() {
        let err = LmdbCacheBackend::decode_value(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, LmdbCacheError::Deserialization(_)));
    }

    #[test]
    fn test_error_conversion() {
        let err: QueryCacheError = LmdbCacheError::Deserialization("bad json".into()).into();
        assert_eq!(
            err,
            QueryCacheError::Backend(BackendError::Deserialization {
                reason: "bad json".to_string()
            })
        );

        let err: QueryCacheError = LmdbCacheError::Transaction("MDB_MAP_FULL".into()).into();
        assert!(matches!(
            err,
            QueryCacheError::Backend(BackendError::Transaction { .. })
        ));
    }
}
