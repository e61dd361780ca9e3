//! Suggestion cache
//!
//! LRU cache keyed by input text with per-entry TTL and a global
//! generation counter. Invalidation bumps the generation, which orphans
//! every existing entry in one atomic store; readers racing a retrain can
//! therefore never mix pre- and post-update results.

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A ranked suggestion with its renormalized confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub text: String,
    pub confidence: f64,
}

struct CacheSlot {
    generation: u64,
    expires_at: Instant,
    suggestions: Vec<Suggestion>,
}

/// Generation-versioned LRU cache of ranked suggestion lists
pub struct SuggestionCache {
    slots: Mutex<LruCache<String, CacheSlot>>,
    generation: AtomicU64,
    ttl: Duration,
}

impl SuggestionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    /// Current cache generation; bumped on every invalidation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Look up the full ranked list for an input. Entries from an older
    /// generation or past their TTL are evicted and reported as misses.
    pub async fn get(&self, input: &str) -> Option<Vec<Suggestion>> {
        let current = self.generation();
        let mut slots = self.slots.lock().await;

        match slots.get(input) {
            Some(slot) if slot.generation == current && slot.expires_at > Instant::now() => {
                Some(slot.suggestions.clone())
            }
            Some(_) => {
                slots.pop(input);
                None
            }
            None => None,
        }
    }

    /// Store the full ranked list for an input under the current
    /// generation
    pub async fn put(&self, input: &str, suggestions: Vec<Suggestion>) {
        let slot = CacheSlot {
            generation: self.generation(),
            expires_at: Instant::now() + self.ttl,
            suggestions,
        };
        self.slots.lock().await.put(input.to_string(), slot);
    }

    /// Orphan every cached entry. O(1): entries are lazily evicted on
    /// their next lookup.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
