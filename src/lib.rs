//! Nested-route data engine.
//!
//! Routes are declared as a tree ([`Route`]) or loaded from a TOML manifest
//! ([`manifest`]), compiled into a ranked [`RouteTable`] and held by a
//! versioned [`RouteRegistry`]. On top of the table:
//!
//! - [`pipeline`] runs loaders concurrently and actions exclusively, and
//!   bubbles failures to the nearest error boundary;
//! - [`revalidation`] decides which loaders re-run;
//! - [`redirect`] follows redirect chains, carrying cookies hop to hop;
//! - [`DataRouter`] is the client-side navigation engine with fetchers;
//! - [`RequestHandler`] answers document, resource and `.data` requests.
//!
//! ```
//! use data_router::{resolve_match_stack, Route, RouteTable, RouterConfig};
//!
//! let routes = vec![Route::new("root", "/")
//!     .error_boundary()
//!     .children(vec![
//!         Route::index("home"),
//!         Route::new("user", "users/:id"),
//!     ])];
//! let table = RouteTable::build(routes, &RouterConfig::default()).unwrap();
//!
//! let matches = resolve_match_stack(&table, "/users/42").unwrap();
//! let ids: Vec<&str> = matches.iter().map(|m| m.id().as_str()).collect();
//! assert_eq!(ids, ["root", "user"]);
//! ```
//!
//! # Features
//!
//! - `log` (default) / `tracing`: logging backend.
//! - `cache` (default): LRU cache of resolved matches.
//! - `middleware` (default): per-route navigation middleware.
//! - `cli`: the `route-check` binary.

#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(all(feature = "log", feature = "tracing"))]
compile_error!("features `log` and `tracing` are mutually exclusive");

pub mod logging;

pub mod abort;
#[cfg(feature = "cache")]
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod manifest;
pub mod matching;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod nested;
pub mod params;
pub mod pipeline;
pub mod redirect;
pub mod registry;
pub mod resolve;
pub mod revalidation;
pub mod route;
pub mod router;
pub mod server;
pub mod state;
pub mod table;

pub use abort::{AbortController, AbortSignal};
#[cfg(feature = "cache")]
pub use cache::{CacheStats, MatchCache};
pub use config::{load_config, ConfigError, RouterConfig};
pub use error::{
    BuildError, ErrorResponse, NavigationResult, RouteCollision, RouteError, RouterError,
};
pub use fetcher::{Fetcher, FetcherState};
pub use loader::{
    action_fn, loader_fn, Action, ActionArgs, DataRequest, DataResult, Loader, LoaderArgs,
    RouteResponse, RouteThrow,
};
pub use manifest::{load_manifest, HandlerSet, ManifestError, RouteManifest};
#[cfg(feature = "middleware")]
pub use middleware::{middleware_fn, RouteMiddleware};
pub use nested::normalize_path;
pub use params::{FormData, QueryParams, RouteParams};
pub use pipeline::{DataContext, LoadFilter, RouteResult};
pub use redirect::{follow_redirects, ChainOutcome, CookieJar};
pub use registry::RouteRegistry;
pub use resolve::{resolve_match_stack, MatchEntry, MatchStack};
pub use revalidation::{should_revalidate_fn, ShouldRevalidate, ShouldRevalidateArgs};
pub use route::{Route, RouteId, RouteKind};
pub use router::{DataRouter, NavigationRequest};
pub use server::RequestHandler;
pub use state::{HistoryAction, HistoryUpdate, Location, Navigation, NavigationState, RouterState};
pub use table::{RouteBranch, RouteNode, RouteTable};
