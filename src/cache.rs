//! Generic TTL cache.
//!
//! Entries expire by wall-clock comparison at read time; a get on an expired
//! entry deletes it lazily. There is no background eviction.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    inner: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value if it has not expired. Expired entries are
    /// removed on the spot.
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let map = self.inner.read();
            match map.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: upgrade to a write lock and drop it. Re-check under the
        // write lock since another writer may have refreshed the entry.
        let mut map = self.inner.write();
        if let Some(entry) = map.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.value.clone());
            }
            map.remove(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.inner.write().insert(key, entry);
    }

    /// Number of entries currently held, including not-yet-collected expired
    /// ones.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
