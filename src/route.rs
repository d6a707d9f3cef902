//! Declarative route definitions.
//!
//! A [`Route`] is one node of the route tree. Exactly one [`RouteKind`] per
//! node:
//!
//! - [`Route::new`]: a path route (`"users"`, `":id"`, `"files/*"`).
//!   Child paths are relative to the parent; an absolute child path must
//!   extend the parent's full path.
//! - [`Route::index`]: renders at its parent's exact path; no children.
//! - [`Route::layout`]: pathless layout; contributes no URL segment but
//!   appears in the match chain.
//!
//! Routes are plain values until compiled into a
//! [`RouteTable`](crate::table::RouteTable), which validates and ranks them.
//!
//! # Example
//!
//! ```
//! use data_router::{loader_fn, Route, RouteResponse};
//! use serde_json::json;
//!
//! let routes = vec![Route::new("root", "/")
//!     .error_boundary()
//!     .children(vec![
//!         Route::index("home"),
//!         Route::new("users", "users").child(
//!             Route::new("user", ":id").loader(loader_fn(|args| async move {
//!                 Ok(RouteResponse::data(json!(args.params.get("id"))))
//!             })),
//!         ),
//!     ])];
//! assert_eq!(routes[0].children_routes().len(), 2);
//! ```

use crate::loader::{Action, ActionArgs, DataResult, Loader, LoaderArgs};
#[cfg(feature = "middleware")]
use crate::middleware::RouteMiddleware;
use crate::revalidation::{ShouldRevalidate, ShouldRevalidateArgs};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Route identity
// ============================================================================

/// Stable, caller-chosen route identifier. Keys loader data, action data,
/// errors and `.data` envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RouteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for RouteId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RouteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What a node contributes to the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// Relative (or parent-extending absolute) path pattern.
    Path(String),
    /// Matches only at the parent's exact path.
    Index,
    /// Pathless layout.
    Pathless,
}

// ============================================================================
// Handlers
// ============================================================================

/// Everything attached to a route besides its shape.
#[derive(Clone, Default)]
pub struct RouteHandlers {
    pub loader: Option<Arc<dyn Loader>>,
    pub action: Option<Arc<dyn Action>>,
    pub should_revalidate: Option<Arc<dyn ShouldRevalidate>>,
    /// The route renders errors of itself and its descendants.
    pub error_boundary: bool,
    /// Leaf answers with its raw loader/action body instead of a document.
    pub resource: bool,
    #[cfg(feature = "middleware")]
    pub middleware: Vec<Arc<dyn RouteMiddleware>>,
}

impl fmt::Debug for RouteHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandlers")
            .field("loader", &self.loader.is_some())
            .field("action", &self.action.is_some())
            .field("should_revalidate", &self.should_revalidate.is_some())
            .field("error_boundary", &self.error_boundary)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl<L: Loader + ?Sized> Loader for Arc<L> {
    fn load(&self, args: LoaderArgs) -> BoxFuture<'static, DataResult> {
        (**self).load(args)
    }
}

impl<A: Action + ?Sized> Action for Arc<A> {
    fn run(&self, args: ActionArgs) -> BoxFuture<'static, DataResult> {
        (**self).run(args)
    }
}

impl<S: ShouldRevalidate + ?Sized> ShouldRevalidate for Arc<S> {
    fn should_revalidate(&self, args: &ShouldRevalidateArgs<'_>) -> bool {
        (**self).should_revalidate(args)
    }
}

// ============================================================================
// Route builder
// ============================================================================

/// One node of the route tree, before compilation.
#[derive(Debug, Clone)]
pub struct Route {
    pub(crate) id: RouteId,
    pub(crate) kind: RouteKind,
    pub(crate) handlers: RouteHandlers,
    pub(crate) children: Vec<Route>,
}

impl Route {
    /// Path route.
    pub fn new(id: impl Into<RouteId>, path: impl Into<String>) -> Self {
        Self::with_kind(id, RouteKind::Path(path.into()))
    }

    /// Index route.
    pub fn index(id: impl Into<RouteId>) -> Self {
        Self::with_kind(id, RouteKind::Index)
    }

    /// Pathless layout route.
    pub fn layout(id: impl Into<RouteId>) -> Self {
        Self::with_kind(id, RouteKind::Pathless)
    }

    fn with_kind(id: impl Into<RouteId>, kind: RouteKind) -> Self {
        Self {
            id: id.into(),
            kind,
            handlers: RouteHandlers::default(),
            children: Vec::new(),
        }
    }

    pub fn loader(mut self, loader: impl Loader) -> Self {
        self.handlers.loader = Some(Arc::new(loader));
        self
    }

    pub fn action(mut self, action: impl Action) -> Self {
        self.handlers.action = Some(Arc::new(action));
        self
    }

    pub fn should_revalidate(mut self, policy: impl ShouldRevalidate) -> Self {
        self.handlers.should_revalidate = Some(Arc::new(policy));
        self
    }

    /// Mark this route as an error boundary.
    pub fn error_boundary(mut self) -> Self {
        self.handlers.error_boundary = true;
        self
    }

    /// Mark this route as a resource route.
    pub fn resource(mut self) -> Self {
        self.handlers.resource = true;
        self
    }

    #[cfg(feature = "middleware")]
    pub fn middleware(mut self, middleware: impl RouteMiddleware) -> Self {
        self.handlers.middleware.push(Arc::new(middleware));
        self
    }

    /// Replace all handlers at once (used by the manifest loader).
    pub fn handlers(mut self, handlers: RouteHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Append children, in definition order.
    pub fn children(mut self, children: Vec<Route>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn child(mut self, child: Route) -> Self {
        self.children.push(child);
        self
    }

    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn kind(&self) -> &RouteKind {
        &self.kind
    }

    pub fn children_routes(&self) -> &[Route] {
        &self.children
    }

    pub fn route_handlers(&self) -> &RouteHandlers {
        &self.handlers
    }
}
