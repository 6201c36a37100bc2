use dashmap::DashMap;
use std::hash::Hash;

/// A shared cache with a hard capacity. Insertion past the capacity clears
/// the map; the hit rate recovers quickly because keys are coordinate
/// quantized, while memory stays bounded across long-running query load.
#[derive(Debug)]
pub struct BoundedCache<K: Eq + Hash, V> {
    map: DashMap<K, V>,
    capacity: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: K, value: V) {
        if self.map.len() >= self.capacity {
            self.map.clear();
        }
        self.map.insert(key, value);
    }

    pub fn get_or_insert_with(&self, key: K, produce: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = produce();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}
