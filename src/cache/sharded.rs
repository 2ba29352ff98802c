//! Sharded order cache

use crate::error::{Error, Result};
use crate::model::Order;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

/// Shard count used when none is configured
pub const DEFAULT_SHARD_COUNT: usize = 32;

/// One independently locked partition of the key space
#[derive(Default)]
struct Shard {
    orders: RwLock<HashMap<String, Order>>,
}

/// Concurrent order cache partitioned into a fixed number of shards
///
/// A key always lives in the same shard for the lifetime of the cache.
/// Every read hands out a clone; no reference into a shard escapes.
pub struct ShardedCache {
    shards: Box<[Shard]>,
    mask: u64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl ShardedCache {
    /// Create a cache with [`DEFAULT_SHARD_COUNT`] shards
    pub fn new() -> Self {
        Self::build(DEFAULT_SHARD_COUNT)
    }

    /// Create a cache with a custom shard count
    ///
    /// The count must be a non-zero power of two.
    pub fn with_shards(shard_count: usize) -> Result<Self> {
        if shard_count == 0 || !shard_count.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "shard count must be a non-zero power of two, got {}",
                shard_count
            )));
        }
        Ok(Self::build(shard_count))
    }

    fn build(shard_count: usize) -> Self {
        let shards = (0..shard_count)
            .map(|_| Shard::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            mask: (shard_count - 1) as u64,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// Index of the shard owning `key`
    pub fn shard_index(&self, key: &str) -> usize {
        (xxh3_64(key.as_bytes()) & self.mask) as usize
    }

    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Insert or overwrite an order
    pub fn set(&self, key: &str, order: Order) {
        let shard = self.shard(key);
        shard.orders.write().insert(key.to_string(), order);
        debug!(order_uid = %key, "Cached order");
    }

    /// Get a copy of a cached order
    pub fn get(&self, key: &str) -> Option<Order> {
        let found = self.shard(key).orders.read().get(key).cloned();
        if found.is_some() {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Remove an order, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        self.shard(key).orders.write().remove(key).is_some()
    }

    /// Copy every cached order
    ///
    /// Shards are read one at a time; writes to shards not yet visited may
    /// or may not show up in the result.
    pub fn get_all(&self) -> HashMap<String, Order> {
        let mut result = HashMap::new();
        for shard in self.shards.iter() {
            let orders = shard.orders.read();
            result.extend(orders.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        result
    }

    /// Number of cached orders
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.orders.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.orders.read().is_empty())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Entry count per shard, in shard order
    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(|s| s.orders.read().len()).collect()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hit_count.load(Ordering::Relaxed);
        let misses = self.miss_count.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            hit_rate,
            entries: self.len(),
            shards: self.shard_count(),
        }
    }
}

impl Default for ShardedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedCache")
            .field("shards", &self.shards.len())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub shards: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::sample_order;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_unknown_key_misses() {
        let cache = ShardedCache::new();
        assert!(cache.get("non-existent").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_set_and_get() {
        let cache = ShardedCache::new();
        let order = sample_order("test-123");

        cache.set(order.key(), order.clone());
        assert_eq!(cache.get("test-123"), Some(order));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate, 1.0);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = ShardedCache::new();
        let mut order = sample_order("overwrite");
        cache.set(order.key(), order.clone());

        order.track_number = "CHANGED".to_string();
        cache.set(order.key(), order.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("overwrite").unwrap().track_number, "CHANGED");
    }

    #[test]
    fn test_returned_copy_is_detached() {
        let cache = ShardedCache::new();
        cache.set("detached", sample_order("detached"));

        let mut copy = cache.get("detached").unwrap();
        copy.items.clear();

        assert_eq!(cache.get("detached").unwrap().items.len(), 1);
    }

    #[test]
    fn test_get_all() {
        let cache = ShardedCache::new();
        for i in 0..100 {
            let uid = format!("order-{}", i);
            cache.set(&uid, sample_order(&uid));
        }

        let all = cache.get_all();
        assert_eq!(all.len(), 100);
        assert!(all.contains_key("order-0"));
        assert!(all.contains_key("order-99"));
        assert_eq!(all["order-42"].order_uid, "order-42");
    }

    #[test]
    fn test_remove() {
        let cache = ShardedCache::new();
        cache.set("test-remove", sample_order("test-remove"));
        assert!(cache.get("test-remove").is_some());

        assert!(cache.remove("test-remove"));
        assert!(cache.get("test-remove").is_none());

        // Absent key is a no-op
        assert!(!cache.remove("test-remove"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shard_routing_is_stable() {
        let cache = ShardedCache::new();
        let first = cache.shard_index("stable-key");
        for _ in 0..10 {
            assert_eq!(cache.shard_index("stable-key"), first);
        }
        assert!(first < cache.shard_count());
    }

    #[test]
    fn test_keys_spread_across_shards() {
        let cache = ShardedCache::new();
        for i in 0..1000 {
            let uid = format!("spread-{}", i);
            cache.set(&uid, sample_order(&uid));
        }

        let sizes = cache.shard_sizes();
        assert_eq!(sizes.len(), DEFAULT_SHARD_COUNT);
        assert_eq!(sizes.iter().sum::<usize>(), 1000);
        assert!(sizes.iter().all(|&n| n > 0), "empty shard in {:?}", sizes);
    }

    #[test]
    fn test_shard_count_must_be_power_of_two() {
        assert!(ShardedCache::with_shards(0).is_err());
        assert!(ShardedCache::with_shards(12).is_err());
        assert_eq!(ShardedCache::with_shards(1).unwrap().shard_count(), 1);
        assert_eq!(ShardedCache::with_shards(64).unwrap().shard_count(), 64);
    }

    #[test]
    fn test_single_shard_cache() {
        let cache = ShardedCache::with_shards(1).unwrap();
        cache.set("a", sample_order("a"));
        cache.set("b", sample_order("b"));
        assert_eq!(cache.shard_sizes(), vec![2]);
    }

    #[test]
    fn test_concurrent_disjoint_writers() {
        let cache = Arc::new(ShardedCache::new());
        let mut handles = Vec::new();

        for t in 0..8 {
            let cache = cache.clone();
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    let uid = format!("t{}-{}", t, i);
                    cache.set(&uid, sample_order(&uid));
                    let read = cache.get(&uid).expect("own write must be visible");
                    assert_eq!(read.order_uid, uid);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let keys: HashSet<String> = cache.get_all().into_keys().collect();
        assert_eq!(keys.len(), 8 * 250);
        assert!(keys.contains("t7-249"));
    }

    #[test]
    fn test_concurrent_readers_and_writers_same_keys() {
        let cache = Arc::new(ShardedCache::with_shards(4).unwrap());
        for i in 0..16 {
            let uid = format!("shared-{}", i);
            cache.set(&uid, sample_order(&uid));
        }

        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = cache.clone();
            handles.push(thread::spawn(move || {
                for round in 0..200 {
                    let uid = format!("shared-{}", (t + round) % 16);
                    if round % 3 == 0 {
                        cache.set(&uid, sample_order(&uid));
                    } else {
                        assert!(cache.get(&uid).is_some());
                    }
                    let _ = cache.get_all();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
    }
}
