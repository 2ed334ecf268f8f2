//! Parse cache
//!
//! Content-addressed memo of parser output with LRU eviction. Re-adding a
//! source whose text was seen recently (delete then recreate, or an edit
//! that is reverted) skips the parser entirely.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::frontend::UnboundElement;

use super::source::ContentHash;

/// Cache key for lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub hash: ContentHash,
}

impl CacheKey {
    pub fn new(source: &str, text: &str) -> Self {
        Self { source: source.to_string(), hash: ContentHash::from_str(text) }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct ParseCache {
    entries: LruCache<CacheKey, Arc<Vec<UnboundElement>>>,
    hits: u64,
    misses: u64,
}

impl ParseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: LruCache::new(capacity), hits: 0, misses: 0 }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Vec<UnboundElement>>> {
        match self.entries.get(key) {
            Some(elements) => {
                self.hits += 1;
                Some(elements.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, elements: Arc<Vec<UnboundElement>>) {
        self.entries.put(key, elements);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits, misses: self.misses, entries: self.entries.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_and_misses() {
        let mut cache = ParseCache::new(2);
        let key = CacheKey::new("/a.pure", "Class a::A {}");
        assert!(cache.get(&key).is_none());

        cache.insert(key.clone(), Arc::new(Vec::new()));
        assert!(cache.get(&key).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = ParseCache::new(1);
        let first = CacheKey::new("/a.pure", "x");
        let second = CacheKey::new("/a.pure", "y");
        cache.insert(first.clone(), Arc::new(Vec::new()));
        cache.insert(second.clone(), Arc::new(Vec::new()));
        assert!(cache.get(&first).is_none());
        assert!(cache.get(&second).is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = ParseCache::new(0);
        let key = CacheKey::new("/a.pure", "x");
        cache.insert(key.clone(), Arc::new(Vec::new()));
        assert!(cache.get(&key).is_some());
    }
}
