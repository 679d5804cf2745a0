//! In-memory `CacheProvider` backed by a concurrent map.
//!
//! TTL deadlines are checked lazily on read (an expired entry is treated as
//! a miss and removed) and swept periodically by the cache warmer's
//! background tick, mirroring the resource policy that the cache-provider
//! connection pool is a process-wide singleton with internal locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::{glob_matches, sha256_hex, CacheProvider};
use crate::error::CacheError;

struct StoredEntry {
    bytes: bytes::Bytes,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process TTL cache. Sufficient for the core's own tests and for a
/// single-process deployment; a distributed backend is an interface-only
/// collaborator behind the same [`CacheProvider`] trait.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every entry whose TTL has elapsed. Called by the cache
    /// warmer's periodic tick so that expired entries don't accumulate
    /// indefinitely between reads.
    pub fn sweep_expired(&self) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        (before - self.entries.len()) as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheProvider for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<bytes::Bytes>, CacheError> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.bytes.clone())),
            Some(_) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: bytes::Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                bytes: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, bytes::Bytes>, CacheError> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    async fn set_multi(&self, entries: Vec<(String, bytes::Bytes)>, ttl: Duration) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, glob: &str) -> Result<u64, CacheError> {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| glob_matches(glob, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let count = matching.len() as u64;
        for key in matching {
            self.entries.remove(&key);
        }
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        Ok(self.entries.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.expires_at.saturating_duration_since(Instant::now()))
            }
        }))
    }
}

/// Computes the ETag for a response body: lowercase hex of the first 16
/// bytes of the body's SHA-256 digest.
pub fn etag_for(body: &[u8]) -> String {
    let full = sha256_hex(body);
    full.chars().take(32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_the_value() {
        let cache = MemoryCache::new();
        cache
            .set("facility:id:f1", bytes::Bytes::from_static(b"payload"), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get("facility:id:f1").await.unwrap(),
            Some(bytes::Bytes::from_static(b"payload"))
        );
    }

    #[tokio::test]
    async fn expired_entry_reads_as_a_miss() {
        let cache = MemoryCache::new();
        cache
            .set("facility:id:f1", bytes::Bytes::from_static(b"payload"), Duration::from_millis(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("facility:id:f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_pattern_evicts_matching_keys_only() {
        let cache = MemoryCache::new();
        cache
            .set_multi(
                vec![
                    ("facility:active:20:0".into(), bytes::Bytes::from_static(b"a")),
                    ("facility:active:20:20".into(), bytes::Bytes::from_static(b"b")),
                    ("facility:id:f1".into(), bytes::Bytes::from_static(b"c")),
                ],
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let evicted = cache.delete_pattern("facility:active:*").await.unwrap();
        assert_eq!(evicted, 2);
        assert!(cache.get("facility:id:f1").await.unwrap().is_some());
    }

    #[test]
    fn etag_is_32_hex_chars() {
        let tag = etag_for(b"hello world");
        assert_eq!(tag.len(), 32);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
