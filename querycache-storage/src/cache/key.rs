//! Cache group and cache key derivation.
//!
//! A [`CacheGroup`] names the invalidation scope `(ds_name, table, version)`.
//! A [`CacheKey`] names one cached result inside a group. Both are rendered to
//! a single string; the rendering is injective, so two different inputs can
//! never share a key, whatever characters callers put in their names.
//!
//! Text fields are length-prefixed (`{byte_len}:{text}`), which makes the
//! separator purely cosmetic: `("a#1", "b")` and `("a", "1#b")` render as
//! `3:a#1#1:b#…` and `1:a#3:1#b#…`.

use std::fmt;
use std::fmt::Write as _;

use chrono::SecondsFormat;
use querycache_core::{CacheResult, SqlValue, TableVersion, ValidationError};

/// Separator between rendered fields.
const SEPARATOR: char = '#';

/// Rendering of an absent parameter list. Distinct from `[]`.
pub const NULL_PARAMS: &str = "null";

/// Invalidation scope for one table at one version.
///
/// Bumping the version yields a different group, which orphans every key
/// derived from the old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheGroup {
    /// Private rendered form - only constructible through `new()`.
    rendered: String,
}

impl CacheGroup {
    /// Derive the group for `(ds_name, table, version)`.
    ///
    /// Rejects an empty table name. An empty data source name is allowed and
    /// renders as `0:`.
    pub fn new(ds_name: &str, table: &str, version: TableVersion) -> CacheResult<Self> {
        if table.is_empty() {
            return Err(ValidationError::missing("table").into());
        }

        let mut rendered = String::with_capacity(ds_name.len() + table.len() + 32);
        push_text(&mut rendered, ds_name);
        rendered.push(SEPARATOR);
        push_text(&mut rendered, table);
        rendered.push(SEPARATOR);
        let _ = write!(rendered, "{}", version);

        Ok(Self { rendered })
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Prefix shared by every key derived from this group and by no other key.
    ///
    /// Ordered stores can flush a group with a single prefix scan.
    pub fn key_prefix(&self) -> String {
        let mut prefix = String::with_capacity(self.rendered.len() + 1);
        prefix.push_str(&self.rendered);
        prefix.push(SEPARATOR);
        prefix
    }
}

impl fmt::Display for CacheGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Identity of one cached result within a [`CacheGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    rendered: String,
    group_len: usize,
}

impl CacheKey {
    /// Derive the key for `(group, query, params)`.
    ///
    /// `params: None` and `params: Some(&[])` produce different keys.
    pub fn new(group: &CacheGroup, query: &str, params: Option<&[SqlValue]>) -> CacheResult<Self> {
        if query.is_empty() {
            return Err(ValidationError::missing("query").into());
        }

        let mut rendered = String::with_capacity(group.as_str().len() + query.len() + 32);
        rendered.push_str(group.as_str());
        rendered.push(SEPARATOR);
        push_text(&mut rendered, query);
        rendered.push(SEPARATOR);
        push_params(&mut rendered, params);

        Ok(Self {
            rendered,
            group_len: group.as_str().len(),
        })
    }

    /// Rendered group this key was derived from.
    pub fn group_str(&self) -> &str {
        &self.rendered[..self.group_len]
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Deterministic rendering of a parameter list.
pub fn render_params(params: Option<&[SqlValue]>) -> String {
    let mut out = String::new();
    push_params(&mut out, params);
    out
}

fn push_text(out: &mut String, text: &str) {
    let _ = write!(out, "{}:", text.len());
    out.push_str(text);
}

fn push_params(out: &mut String, params: Option<&[SqlValue]>) {
    let Some(params) = params else {
        out.push_str(NULL_PARAMS);
        return;
    };

    out.push('[');
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_param(out, param);
    }
    out.push(']');
}

/// One parameter as `{type tag}` plus payload. Variable-length payloads are
/// length-prefixed; fixed-form payloads never contain `,` or `]`.
fn push_param(out: &mut String, param: &SqlValue) {
    match param {
        SqlValue::Null => out.push('n'),
        SqlValue::Bool(b) => out.push_str(if *b { "b:1" } else { "b:0" }),
        SqlValue::Int(i) => {
            let _ = write!(out, "i:{}", i);
        }
        SqlValue::Float(x) => {
            let _ = write!(out, "f:{:016x}", canonical_float_bits(*x));
        }
        SqlValue::Text(s) => {
            out.push('s');
            push_text(out, s);
        }
        SqlValue::Bytes(bytes) => {
            let _ = write!(out, "x{}:", bytes.len());
            for b in bytes {
                let _ = write!(out, "{:02x}", b);
            }
        }
        SqlValue::Timestamp(ts) => {
            out.push_str("t:");
            out.push_str(&ts.to_rfc3339_opts(SecondsFormat::Nanos, true));
        }
        SqlValue::Uuid(id) => {
            let _ = write!(out, "u:{}", id.as_hyphenated());
        }
    }
}

/// Floats that compare equal must render equal: `-0.0 == 0.0`.
fn canonical_float_bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        x.to_bits()
    }
}
