//! Read-through TTL cache with explicit clocks.
//!
//! Backs the settings provider (short TTL) and the principal info cache
//! (multi-minute TTL). Reads take `now` as a parameter so staleness is
//! deterministic under test; a stale entry is evicted on read and never
//! served.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

struct Cached<V> {
    value: V,
    cached_at: i64,
}

pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Cached<V>>>,
    ttl_secs: i64,
    max_entries: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize, ttl_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(max_entries.min(1024))),
            ttl_secs,
            max_entries,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Fresh value for `key`, or `None`. Entries at or past the TTL are
    /// evicted rather than served.
    pub fn get(&self, key: &K, now: i64) -> Option<V> {
        use std::sync::atomic::Ordering;
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(c) if now - c.cached_at < self.ttl_secs => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(c.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }
        // Stale: upgrade to the write lock and evict.
        let mut entries = self.entries.write();
        if let Some(c) = entries.get(key) {
            if now - c.cached_at < self.ttl_secs {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(c.value.clone());
            }
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: K, value: V, now: i64) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            // At capacity: drop the oldest entry.
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, c)| c.cached_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, Cached { value, cached_at: now });
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.write().remove(key);
    }

    /// Drop every entry at or past the TTL.
    pub fn prune_expired(&self, now: i64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, c| now - c.cached_at < self.ttl_secs);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_served() {
        let cache: TtlCache<String, u32> = TtlCache::new(16, 15);
        cache.insert("ws1".into(), 7, 100);
        assert_eq!(cache.get(&"ws1".into(), 110), Some(7));
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_stale_entry_never_served() {
        let cache: TtlCache<String, u32> = TtlCache::new(16, 15);
        cache.insert("ws1".into(), 7, 100);
        assert_eq!(cache.get(&"ws1".into(), 115), None);
        // Evicted, not just hidden.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let cache: TtlCache<u32, u32> = TtlCache::new(2, 1000);
        cache.insert(1, 1, 100);
        cache.insert(2, 2, 200);
        cache.insert(3, 3, 300);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1, 301), None);
        assert_eq!(cache.get(&3, 301), Some(3));
    }

    #[test]
    fn test_prune_expired() {
        let cache: TtlCache<u32, u32> = TtlCache::new(16, 10);
        cache.insert(1, 1, 100);
        cache.insert(2, 2, 105);
        assert_eq!(cache.prune_expired(112), 1);
        assert_eq!(cache.len(), 1);
    }
}
