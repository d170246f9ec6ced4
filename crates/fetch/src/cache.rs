use std::collections::HashMap;
use std::time::{Duration, Instant};

use toolgate_common::types::SpecCacheEntry;

/// In-memory Spec Cache. Content-addressed: entries for
/// the same url accumulate by hash rather than overwrite, so a stale
/// `get_by_hash` lookup against an older discovery still resolves.
pub struct SpecCache {
    entries: HashMap<String, Vec<Entry>>,
}

struct Entry {
    spec: SpecCacheEntry,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

impl SpecCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Newest unexpired entry for `url`.
    pub fn get(&self, url: &str) -> Option<SpecCacheEntry> {
        let hit = self
            .entries
            .get(url)?
            .iter()
            .filter(|e| !e.is_expired())
            .max_by_key(|e| e.inserted_at);

        match hit {
            Some(e) => {
                metrics::counter!("toolgate.spec_cache.hit").increment(1);
                Some(e.spec.clone())
            }
            None => {
                metrics::counter!("toolgate.spec_cache.miss").increment(1);
                None
            }
        }
    }

    /// Exact `(url, hash)` lookup, ignoring expiry — callers that already
    /// know the hash they want are asking for that specific snapshot.
    pub fn get_by_hash(&self, url: &str, hash: &str) -> Option<SpecCacheEntry> {
        self.entries
            .get(url)?
            .iter()
            .find(|e| e.spec.spec_hash == hash)
            .map(|e| e.spec.clone())
    }

    /// Idempotent upsert: a set for a url/hash already present just
    /// refreshes `expires_at` (last write wins).
    pub fn set(&mut self, spec: SpecCacheEntry, ttl: Duration) {
        let bucket = self.entries.entry(spec.url.clone()).or_default();
        bucket.retain(|e| e.spec.spec_hash != spec.spec_hash);
        bucket.retain(|e| !e.is_expired());
        bucket.push(Entry {
            spec,
            inserted_at: Instant::now(),
            ttl,
        });
    }

    pub fn invalidate(&mut self, url: &str) {
        self.entries.remove(url);
    }
}

impl Default for SpecCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, hash: &str) -> SpecCacheEntry {
        SpecCacheEntry {
            url: url.to_string(),
            spec_hash: hash.to_string(),
            raw_spec: "{}".to_string(),
            content_type: Some("application/json".to_string()),
            expires_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn get_misses_on_empty_cache() {
        let cache = SpecCache::new();
        assert!(cache.get("https://example.com/openapi.json").is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut cache = SpecCache::new();
        cache.set(
            entry("https://example.com/openapi.json", "h1"),
            Duration::from_secs(60),
        );
        let hit = cache.get("https://example.com/openapi.json").unwrap();
        assert_eq!(hit.spec_hash, "h1");
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let mut cache = SpecCache::new();
        cache.set(
            entry("https://example.com/openapi.json", "h1"),
            Duration::from_millis(1),
        );
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("https://example.com/openapi.json").is_none());
    }

    #[test]
    fn get_by_hash_is_exact() {
        let mut cache = SpecCache::new();
        cache.set(
            entry("https://example.com/openapi.json", "h1"),
            Duration::from_secs(60),
        );
        assert!(cache
            .get_by_hash("https://example.com/openapi.json", "h2")
            .is_none());
        assert!(cache
            .get_by_hash("https://example.com/openapi.json", "h1")
            .is_some());
    }

    #[test]
    fn invalidate_removes_all_hashes_for_url() {
        let mut cache = SpecCache::new();
        cache.set(
            entry("https://example.com/openapi.json", "h1"),
            Duration::from_secs(60),
        );
        cache.set(
            entry("https://example.com/openapi.json", "h2"),
            Duration::from_secs(60),
        );
        cache.invalidate("https://example.com/openapi.json");
        assert!(cache.get("https://example.com/openapi.json").is_none());
    }
}
