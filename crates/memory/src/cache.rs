use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::types::ContextBundle;

/// Small LRU keyed by `(character_id, user_id, conversation_id)`, default
/// 50 entries / 5-minute TTL, invalidated on any insert/update to that
/// pair (spec §4.3 "Caching"). Mirrors the teacher's `IndexCacheStats`
/// hit/miss bookkeeping idiom from `index.rs`.
pub struct ContextCache {
    inner: LruCache<String, (ContextBundle, Instant)>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl ContextCache {
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self {
            inner: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            ttl: Duration::from_secs(ttl_secs),
            hits: 0,
            misses: 0,
        }
    }

    fn key(character_id: &str, user_id: &str, conversation_id: &str) -> String {
        format!("{character_id}:{user_id}:{conversation_id}")
    }

    pub fn get(&mut self, character_id: &str, user_id: &str, conversation_id: &str) -> Option<ContextBundle> {
        let key = Self::key(character_id, user_id, conversation_id);
        match self.inner.get(&key) {
            Some((bundle, inserted_at)) if inserted_at.elapsed() < self.ttl => {
                self.hits += 1;
                Some(bundle.clone())
            }
            Some(_) => {
                self.inner.pop(&key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, character_id: &str, user_id: &str, conversation_id: &str, bundle: ContextBundle) {
        let key = Self::key(character_id, user_id, conversation_id);
        self.inner.put(key, (bundle, Instant::now()));
    }

    /// Invalidates every cached entry for a pair regardless of
    /// conversation — any write to that pair's store can affect any of
    /// its conversations' context bundles.
    pub fn invalidate_pair(&mut self, character_id: &str, user_id: &str) {
        let prefix = format!("{character_id}:{user_id}:");
        let stale: Vec<String> = self
            .inner
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            self.inner.pop(&key);
        }
    }

    pub fn hit_rate_pct(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f32 / total as f32) * 100.0
        }
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(50, 300)
    }
}
