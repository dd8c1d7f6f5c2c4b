//! Bounded, concurrency-safe metadata caches.
//!
//! Three independent stores front the schema probe so repeated catalog
//! lookups are O(1) within and across exports. Eviction is approximate-LRU:
//! entries carry an access stamp from a shared logical clock, and inserts over
//! capacity evict the stalest entries. Racing writes for the same key are
//! idempotent (both writers produce the same probe result).

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::core::{ColumnMetadata, Fk};

/// Default capacity of each cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// A size-bounded concurrent key-value store with approximate-LRU eviction.
pub struct BoundedCache<V> {
    map: DashMap<String, Stamped<V>>,
    capacity: usize,
    clock: AtomicU64,
}

struct Stamped<V> {
    value: V,
    touched: AtomicU64,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        BoundedCache {
            map: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a key, refreshing its access stamp.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.map.get(key)?;
        entry.touched.store(self.tick(), Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Insert a value, evicting the stalest entries when over capacity.
    pub fn insert(&self, key: String, value: V) {
        if self.map.len() >= self.capacity && !self.map.contains_key(&key) {
            self.evict_one();
        }
        self.map.insert(
            key,
            Stamped {
                value,
                touched: AtomicU64::new(self.tick()),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn evict_one(&self) {
        let mut stalest: Option<(String, u64)> = None;
        for entry in self.map.iter() {
            let touched = entry.touched.load(Ordering::Relaxed);
            match &stalest {
                Some((_, t)) if *t <= touched => {}
                _ => stalest = Some((entry.key().clone(), touched)),
            }
        }
        if let Some((key, _)) = stalest {
            self.map.remove(&key);
        }
    }
}

/// The three metadata caches, keyed by lowercased table name.
pub struct MetadataCache {
    /// table -> FK edges in both directions.
    pub fks: BoundedCache<Vec<Fk>>,

    /// table -> primary-key column names in declared order.
    pub pks: BoundedCache<Vec<String>>,

    /// table -> column metadata ordered by ordinal position.
    pub columns: BoundedCache<Vec<ColumnMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MetadataCache {
            fks: BoundedCache::new(capacity),
            pks: BoundedCache::new(capacity),
            columns: BoundedCache::new(capacity),
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
