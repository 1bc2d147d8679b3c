//! Sharded concurrent map — lock striping for per-key hot paths.
//!
//! The rate tracker, suspension table, and escalation ledger all perform
//! read-modify-write on one key per event, from many event tasks at once.
//! A single `RwLock<HashMap>` would serialize unrelated workspaces; instead
//! keys hash to one of a fixed set of shards and only that shard locks.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

const DEFAULT_SHARDS: usize = 16;

pub struct ShardedMap<K, V> {
    shards: Vec<RwLock<HashMap<K, V>>>,
    mask: usize,
}

impl<K, V> ShardedMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// `shards` is rounded up to the next power of two.
    pub fn with_shards(shards: usize) -> Self {
        let n = shards.max(1).next_power_of_two();
        Self {
            shards: (0..n).map(|_| RwLock::new(HashMap::new())).collect(),
            mask: n - 1,
        }
    }

    fn shard_for(&self, key: &K) -> &RwLock<HashMap<K, V>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize & self.mask]
    }

    /// Run `f` against the entry for `key` under the shard's read lock.
    pub fn with<R>(&self, key: &K, f: impl FnOnce(Option<&V>) -> R) -> R {
        let shard = self.shard_for(key).read();
        f(shard.get(key))
    }

    /// Run `f` against the whole shard map for `key` under the write lock.
    /// The single critical section for read-modify-write on one key.
    pub fn with_mut<R>(&self, key: &K, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        let mut shard = self.shard_for(key).write();
        f(&mut shard)
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.shard_for(&key).write().insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard_for(key).write().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard_for(key).read().contains_key(key)
    }

    /// Apply a retain predicate to every shard. Used by sweep passes.
    pub fn retain_all(&self, mut pred: impl FnMut(&K, &mut V) -> bool) {
        for shard in &self.shards {
            shard.write().retain(|k, v| pred(k, v));
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }
}

impl<K: Eq + Hash, V> Default for ShardedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let map: ShardedMap<String, u32> = ShardedMap::new();
        map.insert("a".into(), 1);
        map.insert("b".into(), 2);
        assert!(map.contains(&"a".into()));
        assert_eq!(map.with(&"b".into(), |v| v.copied()), Some(2));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_with_mut_read_modify_write() {
        let map: ShardedMap<&str, u32> = ShardedMap::new();
        for _ in 0..5 {
            map.with_mut(&"k", |shard| *shard.entry("k").or_insert(0) += 1);
        }
        assert_eq!(map.with(&"k", |v| v.copied()), Some(5));
    }

    #[test]
    fn test_retain_all() {
        let map: ShardedMap<u32, u32> = ShardedMap::with_shards(4);
        for i in 0..100 {
            map.insert(i, i);
        }
        map.retain_all(|_, v| *v % 2 == 0);
        assert_eq!(map.len(), 50);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;
        let map: Arc<ShardedMap<u32, u64>> = Arc::new(ShardedMap::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let m = map.clone();
                std::thread::spawn(move || {
                    for i in 0..1000u32 {
                        let key = (t * 1000 + i) % 64;
                        m.with_mut(&key, |shard| *shard.entry(key).or_insert(0) += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let total: u64 = (0..64).filter_map(|k| map.with(&k, |v| v.copied())).sum();
        assert_eq!(total, 8_000);
    }
}
