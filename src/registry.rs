//! Versioned route registry.
//!
//! Holds the current [`RouteTable`] behind an [`ArcSwap`]. Readers take a
//! lock-free snapshot; a rebuild compiles a whole new table and publishes it
//! with one pointer swap, so in-flight requests keep the table they started
//! with. Every publish bumps the version and clears the match cache.
//!
//! The version lives on the table itself. Publishes are serialized so the
//! next version is always the published one plus one.

#[cfg(feature = "cache")]
use crate::cache::{CacheStats, MatchCache};
use crate::config::RouterConfig;
use crate::error::BuildError;
#[cfg(feature = "cache")]
use crate::nested::normalize_path;
use crate::resolve::{resolve_match_stack, MatchStack};
use crate::route::Route;
use crate::table::RouteTable;
use crate::{info_log, warn_log};
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub struct RouteRegistry {
    table: ArcSwap<RouteTable>,
    publish: Mutex<()>,
    config: RouterConfig,
    #[cfg(feature = "cache")]
    cache: Mutex<MatchCache>,
}

impl RouteRegistry {
    /// Validate `config` and build the initial table (version 1).
    pub fn new(routes: Vec<Route>, config: RouterConfig) -> Result<Self, BuildError> {
        config.validate().map_err(BuildError::InvalidConfig)?;
        let mut table = RouteTable::build(routes, &config)?;
        table.set_version(1);
        info_log!("Route registry initialized with {} routes", table.len());
        Ok(Self {
            table: ArcSwap::from_pointee(table),
            publish: Mutex::new(()),
            #[cfg(feature = "cache")]
            cache: Mutex::new(MatchCache::with_capacity(config.cache_capacity)),
            config,
        })
    }

    /// Current table snapshot.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    pub fn version(&self) -> u64 {
        self.table.load().version()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Compile `routes` and publish the result. On a build error the current
    /// table stays in place.
    pub fn rebuild(&self, routes: Vec<Route>) -> Result<Arc<RouteTable>, BuildError> {
        match RouteTable::build(routes, &self.config) {
            Ok(table) => Ok(self.swap(table)),
            Err(e) => {
                warn_log!("Route rebuild rejected, keeping v{}: {}", self.version(), e);
                Err(e)
            }
        }
    }

    /// Publish an already-built table, returning the previous one.
    pub fn swap(&self, mut table: RouteTable) -> Arc<RouteTable> {
        let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        let version = self.table.load().version() + 1;
        table.set_version(version);
        let previous = self.table.swap(Arc::new(table));
        #[cfg(feature = "cache")]
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info_log!(
            "Route registry swapped v{} → v{}",
            previous.version(),
            version
        );
        previous
    }

    /// Resolve against the current snapshot.
    pub fn resolve(&self, path: &str) -> Option<MatchStack> {
        self.resolve_in(&self.snapshot(), path)
    }

    /// Resolve against a specific snapshot, going through the cache.
    pub fn resolve_in(&self, table: &RouteTable, path: &str) -> Option<MatchStack> {
        #[cfg(feature = "cache")]
        {
            let path = normalize_path(path);
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(table.version(), &path) {
                return cached;
            }
            let resolved = resolve_match_stack(table, &path);
            cache.insert(table.version(), path.into_owned(), resolved.clone());
            resolved
        }
        #[cfg(not(feature = "cache"))]
        {
            resolve_match_stack(table, path)
        }
    }

    #[cfg(feature = "cache")]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes(leaf: &str) -> Vec<Route> {
        vec![Route::new("root", "/").child(Route::new(leaf, leaf))]
    }

    #[test]
    fn test_swap_bumps_version_and_keeps_old_snapshot() {
        let registry = RouteRegistry::new(routes("a"), RouterConfig::default()).unwrap();
        let before = registry.snapshot();
        assert_eq!(before.version(), 1);

        registry.rebuild(routes("b")).unwrap();
        assert_eq!(registry.version(), 2);
        assert!(before.node("a").is_some());
        assert!(registry.snapshot().node("a").is_none());
        assert!(registry.resolve("/b").is_some());
        assert!(registry.resolve("/a").is_none());
    }

    #[test]
    fn test_failed_rebuild_keeps_current_table() {
        let registry = RouteRegistry::new(routes("a"), RouterConfig::default()).unwrap();
        let bad = vec![Route::new("x", "x"), Route::new("x", "y")];
        assert!(registry.rebuild(bad).is_err());
        assert_eq!(registry.version(), 1);
        assert!(registry.resolve("/a").is_some());
    }

    #[cfg(feature = "cache")]
    #[test]
    fn test_resolve_uses_cache() {
        let registry = RouteRegistry::new(routes("a"), RouterConfig::default()).unwrap();
        registry.resolve("/a");
        registry.resolve("/a");
        let stats = registry.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        registry.rebuild(routes("a")).unwrap();
        assert_eq!(registry.cache_stats().invalidations, 1);
    }

    #[cfg(feature = "cache")]
    #[test]
    fn test_equivalent_paths_share_a_cache_entry() {
        let registry = RouteRegistry::new(routes("a"), RouterConfig::default()).unwrap();
        let first = registry.resolve("/a/").unwrap();
        let second = registry.resolve("//a").unwrap();
        assert_eq!(first.leaf().unwrap().route.id, second.leaf().unwrap().route.id);

        let stats = registry.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_concurrent_swaps_publish_distinct_versions() {
        let registry = Arc::new(RouteRegistry::new(routes("a"), RouterConfig::default()).unwrap());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.rebuild(routes("a")).unwrap().version())
            })
            .collect();
        let mut replaced: Vec<u64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        replaced.sort_unstable();

        assert_eq!(replaced, (1..=8).collect::<Vec<_>>());
        assert_eq!(registry.version(), 9);
        assert_eq!(registry.snapshot().version(), 9);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RouterConfig {
            basename: "app".to_string(),
            ..RouterConfig::default()
        };
        let err = RouteRegistry::new(routes("a"), config).unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfig(ref errors) if errors[0].field == "basename"));
        assert_eq!(err.route_id(), None);
    }
}
