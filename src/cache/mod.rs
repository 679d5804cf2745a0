//! Cache-provider interface: key/value store with TTL, batch ops, and
//! pattern-based invalidation.
//!
//! A cache error is never fatal to a read — callers treat it as a miss and
//! fall through to the system of record. `delete`/`delete_pattern` failures
//! are logged and retried at most once by the caller (the invalidation
//! service does this for `delete_pattern`; see [`crate::invalidation`]).

pub mod memory;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// Cache key namespace helpers. Keys are ASCII, colon-delimited segments;
/// unbounded-length user input must be hashed before inclusion.
pub mod keys {
    use super::sha256_hex;

    pub fn facility_id(id: &str) -> String {
        format!("facility:id:{id}")
    }

    pub fn facility_type(facility_type: &str) -> String {
        format!("facility:type:{facility_type}")
    }

    pub fn facility_active(limit: u32, offset: u32) -> String {
        format!("facility:active:{limit}:{offset}")
    }

    pub fn facility_active_pattern() -> String {
        "facility:active:*".to_string()
    }

    pub fn facility_search_pattern() -> String {
        "facility:search:*".to_string()
    }

    /// `facility:search:{hash(params)}` — `params` is the canonical query string.
    pub fn facility_search(params: &str) -> String {
        format!("facility:search:{}", sha256_hex(params.as_bytes()))
    }

    /// `http:cache:{hex(sha256(method|path|rawquery))}`.
    pub fn http_cache(method: &str, path: &str, raw_query: &str) -> String {
        let input = format!("{method}:{path}?{raw_query}");
        format!("http:cache:{}", sha256_hex(input.as_bytes()))
    }
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// An opaque cached payload with a TTL deadline and a content tag.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bytes: bytes::Bytes,
    pub etag: String,
}

/// Key/value cache with TTL, batch operations, and glob-pattern invalidation.
///
/// Implementations MUST treat `*` in `delete_pattern` as matching exactly one
/// complete colon-delimited segment, never a partial segment or multiple
/// segments.
#[async_trait]
pub trait CacheProvider: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<bytes::Bytes>, CacheError>;

    async fn set(&self, key: &str, value: bytes::Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, bytes::Bytes>, CacheError>;

    /// Applied atomically per-key but not across keys.
    async fn set_multi(&self, entries: Vec<(String, bytes::Bytes)>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// `glob` supports `*` only, matching complete key segments.
    async fn delete_pattern(&self, glob: &str) -> Result<u64, CacheError>;

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
}

/// Compiles a `*`-glob into a matcher over colon-delimited keys.
///
/// A trailing `:*` segment matches one or more remaining key segments (so
/// `facility:active:*` invalidates every `facility:active:{limit}:{offset}`
/// entry regardless of paging). A `*` anywhere else matches exactly one
/// complete segment.
pub(crate) fn glob_matches(glob: &str, key: &str) -> bool {
    if let Some(prefix) = glob.strip_suffix(":*") {
        let prefix_segments: Vec<&str> = prefix.split(':').collect();
        let key_segments: Vec<&str> = key.split(':').collect();
        return key_segments.len() > prefix_segments.len()
            && prefix_segments.iter().zip(key_segments.iter()).all(|(p, k)| p == k);
    }

    let glob_segments: Vec<&str> = glob.split(':').collect();
    let key_segments: Vec<&str> = key.split(':').collect();

    glob_segments.len() == key_segments.len()
        && glob_segments
            .iter()
            .zip(key_segments.iter())
            .all(|(g, k)| *g == "*" || g == k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_whole_segments_only() {
        assert!(glob_matches("facility:active:*", "facility:active:20:0"));
        assert!(!glob_matches("facility:active:*", "facility:active"));
        assert!(glob_matches("facility:search:*", "facility:search:abcdef"));
        assert!(!glob_matches("facility:search:*", "facility:other:abcdef"));
    }

    #[test]
    fn http_cache_key_is_stable_for_identical_input() {
        let a = keys::http_cache("GET", "/api/facilities/f1", "");
        let b = keys::http_cache("GET", "/api/facilities/f1", "");
        assert_eq!(a, b);
        assert!(a.starts_with("http:cache:"));
    }
}
