//! Response cache
//!
//! Remote responses are memoized by the SHA-256 hex digest of the exact
//! outbound prompt. Entries are immutable once written; a repeated `put`
//! for the same key keeps the first value. The map is guarded by a mutex
//! that is only held for the map operation itself, so readers never see a
//! partially written entry and no lock is ever held across a network call.
//!
//! Capacity is bounded with least-recently-used eviction. A capacity of `0`
//! keeps every response for the process lifetime.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

pub struct ResponseCache {
    entries: Mutex<LruCache<String, String>>,
}

impl ResponseCache {
    /// Create a cache holding at most `max_entries` responses (`0` = unbounded)
    pub fn new(max_entries: usize) -> Self {
        let entries = match NonZeroUsize::new(max_entries) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Cache key for a prompt: lowercase hex SHA-256 of its UTF-8 bytes
    pub fn cache_key(prompt: &str) -> String {
        hex::encode(Sha256::digest(prompt.as_bytes()))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("ResponseCache lock poisoned");
        let hit = entries.get(key).cloned();
        if hit.is_some() {
            debug!("Response cache hit for {}", key.chars().take(12).collect::<String>());
        }
        hit
    }

    /// Store a response. The first value written for a key wins.
    pub fn put(&self, key: &str, text: &str) {
        let mut entries = self.entries.lock().expect("ResponseCache lock poisoned");
        if entries.contains(key) {
            return;
        }
        entries.put(key.to_string(), text.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("ResponseCache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_sha256_hex() {
        assert_eq!(
            ResponseCache::cache_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_cache_key_is_exact() {
        assert_ne!(
            ResponseCache::cache_key("prompt"),
            ResponseCache::cache_key("prompt ")
        );
    }

    #[test]
    fn test_get_missing() {
        let cache = ResponseCache::default();
        assert_eq!(cache.get("nope"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_is_idempotent() {
        let cache = ResponseCache::default();
        let key = ResponseCache::cache_key("p");
        cache.put(&key, "first");
        cache.put(&key, "second");
        assert_eq!(cache.get(&key).as_deref(), Some("first"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded_cache_evicts_least_recent() {
        let cache = ResponseCache::new(2);
        cache.put("a", "1");
        cache.put("b", "2");
        assert!(cache.get("a").is_some());
        cache.put("c", "3");

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let cache = ResponseCache::unbounded();
        for i in 0..5000 {
            cache.put(&i.to_string(), "x");
        }
        assert_eq!(cache.len(), 5000);
    }
}
