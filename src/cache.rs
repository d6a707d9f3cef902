//! Match caching.
//!
//! [`MatchCache`] is an LRU cache of resolved [`MatchStack`]s keyed by
//! `(table version, pathname)`. The registry normalizes the pathname before
//! lookup, so `/a/` and `/a` share an entry. The version keeps a stale entry
//! from being served after a registry swap, even before a clear. It is gated
//! behind the `cache` feature flag and uses the [`lru`] crate internally.
//!
//! Misses are cached too (`None`), since 404 probes are as repetitive as hits.
//!
//! # Examples
//!
//! ```
//! use data_router::cache::MatchCache;
//!
//! let mut cache = MatchCache::new();
//! assert!(cache.get(1, "/users").is_none());
//! cache.insert(1, "/users".to_string(), None);
//! assert!(matches!(cache.get(1, "/users"), Some(None)));
//! assert_eq!(cache.stats().hits, 1);
//! ```

use crate::resolve::MatchStack;
use crate::{debug_log, trace_log};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Lookup counters since creation or the last [`MatchCache::reset_stats`].
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Number of full cache invalidations (via [`MatchCache::clear`]).
    pub invalidations: usize,
}

impl CacheStats {
    /// Return the hit rate as a value in `0.0..=1.0`.
    ///
    /// Returns `0.0` if no lookups have been performed.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    version: u64,
    path: String,
}

/// LRU cache of resolution results.
#[derive(Debug)]
pub struct MatchCache {
    entries: LruCache<CacheKey, Option<MatchStack>>,
    stats: CacheStats,
}

impl MatchCache {
    const DEFAULT_CAPACITY: usize = 1000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a cache with a custom capacity. Zero falls back to one entry.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
            stats: CacheStats::default(),
        }
    }

    /// Look up a cached result. The outer `Option` is hit/miss; the inner
    /// one is the cached match (or cached "no match").
    pub fn get(&mut self, version: u64, path: &str) -> Option<Option<MatchStack>> {
        let key = CacheKey {
            version,
            path: path.to_string(),
        };
        if let Some(stack) = self.entries.get(&key) {
            self.stats.hits += 1;
            trace_log!("Match cache hit for '{}' (v{})", path, version);
            Some(stack.clone())
        } else {
            self.stats.misses += 1;
            trace_log!("Match cache miss for '{}' (v{})", path, version);
            None
        }
    }

    pub fn insert(&mut self, version: u64, path: String, stack: Option<MatchStack>) {
        self.entries.push(CacheKey { version, path }, stack);
    }

    /// Drop every entry and increment the invalidation counter.
    pub fn clear(&mut self) {
        let len = self.entries.len();
        self.entries.clear();
        self.stats.invalidations += 1;
        debug_log!(
            "Match cache cleared: {} entries removed ({} total invalidations, hit rate: {:.1}%)",
            len,
            self.stats.invalidations,
            self.stats.hit_rate() * 100.0
        );
    }

    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}
