//! fnav Content Cache
//!
//! Bounded, recency-ordered store mapping a path to previously fetched
//! markup. Entries carry an absolute expiry that is checked lazily on
//! access; there is no background sweep.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Default number of cached pages
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(49);

/// Default time to live (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Cached fragment
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Markup as returned by the server
    pub value: Arc<str>,
    /// Time when cached
    pub inserted_at: Instant,
}

impl CacheEntry {
    fn new(value: Arc<str>) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    /// Time since the entry was stored
    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }

    /// Check if the entry outlived `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

/// Fragment cache
///
/// Most-recently-used entries sit at the tail. Reads and writes both
/// refresh recency; a write of a new key at capacity evicts the
/// least-recently-used entry first.
pub struct ContentCache {
    entries: LruCache<String, CacheEntry>,
    ttl: Duration,
}

impl ContentCache {
    /// Create a cache with limits
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Get cached markup, promoting it to most-recently-used.
    ///
    /// An entry past its TTL is removed and reported absent.
    pub fn get(&mut self, path: &str) -> Option<Arc<str>> {
        if self.purge_if_stale(path) {
            return None;
        }
        self.entries.get(path).map(|entry| entry.value.clone())
    }

    /// Store markup for a path
    pub fn set(&mut self, path: impl Into<String>, markup: impl Into<Arc<str>>) {
        let path = path.into();
        let entry = CacheEntry::new(markup.into());

        if let Some((evicted, _)) = self.entries.push(path.clone(), entry) {
            if evicted != path {
                tracing::trace!("cache evicted {}", evicted);
            }
        }
    }

    /// Check if a fresh entry exists (without updating recency)
    pub fn has(&mut self, path: &str) -> bool {
        !self.purge_if_stale(path) && self.entries.contains(path)
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&mut self, path: &str) -> bool {
        self.entries.pop(path).is_some()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, stale ones included until touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get cache stats
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            capacity: self.capacity(),
            // `iter` yields most-recent first
            keys: self.entries.iter().rev().map(|(k, _)| k.clone()).collect(),
        }
    }

    /// Drop the entry if it has expired. Returns true when something was purged.
    fn purge_if_stale(&mut self, path: &str) -> bool {
        let stale = match self.entries.peek(path) {
            Some(entry) => entry.is_expired(self.ttl),
            None => return false,
        };
        if stale {
            self.entries.pop(path);
            tracing::trace!("cache expired {}", path);
        }
        stale
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    /// Keys from least- to most-recently used
    pub keys: Vec<String>,
}

impl CacheStats {
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> ContentCache {
        ContentCache::new(NonZeroUsize::new(capacity).unwrap(), Duration::from_secs(60))
    }

    #[test]
    fn test_cache_basic() {
        let mut cache = cache(10);
        cache.set("/page", "<main>Hello</main>");

        assert!(cache.has("/page"));
        assert_eq!(cache.get("/page").as_deref(), Some("<main>Hello</main>"));
        assert!(cache.get("/other").is_none());
    }

    #[test]
    fn test_capacity_scenario() {
        let mut cache = ContentCache::new(NonZeroUsize::new(2).unwrap(), Duration::from_secs(300));
        cache.set("A", "a");
        cache.set("B", "b");
        cache.set("C", "c");

        assert!(!cache.has("A"));
        assert!(cache.has("B"));
        assert!(cache.has("C"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = cache(2);
        cache.set("A", "a");
        cache.set("B", "b");
        assert!(cache.get("A").is_some());
        cache.set("C", "c");

        assert!(cache.has("A"));
        assert!(!cache.has("B"));
    }

    #[test]
    fn test_has_does_not_refresh_recency() {
        let mut cache = cache(2);
        cache.set("A", "a");
        cache.set("B", "b");
        assert!(cache.has("A"));
        cache.set("C", "c");

        assert!(!cache.has("A"));
    }

    #[test]
    fn test_set_existing_updates_value() {
        let mut cache = cache(2);
        cache.set("A", "old");
        cache.set("B", "b");
        cache.set("A", "new");
        cache.set("C", "c");

        assert_eq!(cache.get("A").as_deref(), Some("new"));
        assert!(!cache.has("B"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_stats_order() {
        let mut cache = cache(3);
        cache.set("/a", "1");
        cache.set("/b", "2");
        cache.set("/c", "3");
        cache.get("/a");

        let stats = cache.stats();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.capacity, 3);
        assert_eq!(stats.keys, vec!["/b", "/c", "/a"]);
    }

    #[test]
    fn test_delete_and_clear() {
        let mut cache = cache(4);
        cache.set("/a", "1");
        cache.set("/b", "2");

        assert!(cache.delete("/a"));
        assert!(!cache.delete("/a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_is_purged() {
        let mut cache = ContentCache::new(NonZeroUsize::new(4).unwrap(), Duration::from_millis(20));
        cache.set("/a", "1");
        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get("/a").is_none());
        assert_eq!(cache.len(), 0);
        assert!(cache.get("/a").is_none());
    }
}
