//! Query parameter values and cached payload shapes.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A bound query parameter or a result column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// SQL NULL
    Null,
    Bool(bool),
    Int(i64),
    /// NaN and the infinities serialize as `"NaN"`, `"inf"` and `"-inf"`.
    Float(#[serde(with = "float_repr")] f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
    Uuid(Uuid),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short, stable tag naming the variant.
    pub fn type_tag(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Uuid(_) => "uuid",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("null"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Bytes(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            SqlValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            SqlValue::Uuid(id) => write!(f, "{}", id),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Timestamp> for SqlValue {
    fn from(v: Timestamp) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

mod float_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float `{other}`"))),
            },
        }
    }
}

/// One result row, keyed by column name.
pub type Record = BTreeMap<String, SqlValue>;

/// A cached query result.
///
/// The facade stores and returns these without looking inside; call sites
/// recover their concrete shape through [`FromCacheEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum CacheEntry {
    /// Result of a multi-row select.
    Records(Vec<Record>),
    /// Result of a single-row lookup.
    Record(Record),
    /// A single value (e.g. `SELECT max(id)`).
    Scalar(SqlValue),
    /// Result of a `count(*)` query.
    Count(u64),
}

impl CacheEntry {
    pub fn shape(&self) -> &'static str {
        match self {
            CacheEntry::Records(_) => "records",
            CacheEntry::Record(_) => "record",
            CacheEntry::Scalar(_) => "scalar",
            CacheEntry::Count(_) => "count",
        }
    }
}

impl From<Vec<Record>> for CacheEntry {
    fn from(v: Vec<Record>) -> Self {
        CacheEntry::Records(v)
    }
}

impl From<Record> for CacheEntry {
    fn from(v: Record) -> Self {
        CacheEntry::Record(v)
    }
}

impl From<SqlValue> for CacheEntry {
    fn from(v: SqlValue) -> Self {
        CacheEntry::Scalar(v)
    }
}

impl From<u64> for CacheEntry {
    fn from(v: u64) -> Self {
        CacheEntry::Count(v)
    }
}

/// Typed extraction of a cached payload.
///
/// On a shape mismatch the entry is handed back so the caller can report
/// what was actually stored.
pub trait FromCacheEntry: Sized {
    fn from_entry(entry: CacheEntry) -> Result<Self, CacheEntry>;
}

impl FromCacheEntry for CacheEntry {
    fn from_entry(entry: CacheEntry) -> Result<Self, CacheEntry> {
        Ok(entry)
    }
}

impl FromCacheEntry for Vec<Record> {
    fn from_entry(entry: CacheEntry) -> Result<Self, CacheEntry> {
        match entry {
            CacheEntry::Records(rows) => Ok(rows),
            other => Err(other),
        }
    }
}

impl FromCacheEntry for Record {
    fn from_entry(entry: CacheEntry) -> Result<Self, CacheEntry> {
        match entry {
            CacheEntry::Record(row) => Ok(row),
            other => Err(other),
        }
    }
}

impl FromCacheEntry for SqlValue {
    fn from_entry(entry: CacheEntry) -> Result<Self, CacheEntry> {
        match entry {
            CacheEntry::Scalar(value) => Ok(value),
            other => Err(other),
        }
    }
}

impl FromCacheEntry for u64 {
    fn from_entry(entry: CacheEntry) -> Result<Self, CacheEntry> {
        match entry {
            CacheEntry::Count(n) => Ok(n),
            other => Err(other),
        }
    }
}
