//! Explicit, injectable cache for expensive one-time tables
//!
//! Weight tables and region mappings are costly to load and never change for
//! a given key (version, scenario, file). Callers own a [`DataCache`] and pass
//! it to whatever needs it, so cache lifetime is visible and tests do not share
//! state through globals.

use crate::errors::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Hit and miss counters of a [`DataCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Thread-safe memoizing cache keyed by `K`
///
/// Clones share the same storage.
pub struct DataCache<K, V> {
    entries: Arc<RwLock<HashMap<K, Arc<V>>>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
}

impl<K, V> DataCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return the cached value for `key`, building and storing it on a miss
    ///
    /// The builder runs outside the lock. If two callers race on the same key
    /// both may build, and the first value stored is the one every caller gets.
    ///
    /// # Errors
    ///
    /// Propagates the builder's error; failed builds are not cached.
    pub fn get_or_compute<F>(&self, key: K, builder: F) -> Result<Arc<V>>
    where
        F: FnOnce(&K) -> Result<V>,
    {
        if let Some(value) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for {key:?}, building value");
        let value = Arc::new(builder(&key)?);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(key).or_insert(value)))
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<K, V> Default for DataCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for DataCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
        }
    }
}
