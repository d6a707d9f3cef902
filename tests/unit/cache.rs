//! Unit tests for the LRU match cache
//!
//! Tests for src/cache.rs - verifying insertion, eviction, hit/miss and
//! version isolation.

use data_router::{resolve_match_stack, MatchCache, Route, RouteTable, RouterConfig};

fn table() -> RouteTable {
    RouteTable::build(
        vec![Route::new("root", "/").child(Route::new("user", "users/:id"))],
        &RouterConfig::default(),
    )
    .unwrap()
}

#[test]
fn test_cache_insertion() {
    let table = table();
    let mut cache = MatchCache::new();
    cache.insert(1, "/users/1".to_string(), resolve_match_stack(&table, "/users/1"));

    let cached = cache.get(1, "/users/1").unwrap().unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_eviction() {
    let mut cache = MatchCache::with_capacity(2);
    cache.insert(1, "/a".to_string(), None);
    cache.insert(1, "/b".to_string(), None);
    // Touch "/a" so "/b" is the least recently used
    assert!(cache.get(1, "/a").is_some());
    cache.insert(1, "/c".to_string(), None);

    assert_eq!(cache.len(), 2);
    assert!(cache.get(1, "/b").is_none());
    assert!(cache.get(1, "/a").is_some());
}

#[test]
fn test_cache_hit_miss() {
    let mut cache = MatchCache::new();
    assert!(cache.get(1, "/missing").is_none());
    cache.insert(1, "/missing".to_string(), None);
    assert!(matches!(cache.get(1, "/missing"), Some(None)));

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_versions_do_not_share_entries() {
    let mut cache = MatchCache::new();
    cache.insert(1, "/users/1".to_string(), None);
    assert!(cache.get(2, "/users/1").is_none());
}

#[test]
fn test_clear_counts_invalidations() {
    let mut cache = MatchCache::new();
    cache.insert(1, "/".to_string(), None);
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats().invalidations, 1);

    cache.reset_stats();
    assert_eq!(cache.stats().invalidations, 0);
}
