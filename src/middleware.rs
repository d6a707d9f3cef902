//! Per-route observers around a navigation.
//!
//! A route may carry any number of [`RouteMiddleware`] values. When the route
//! takes part in a navigation its middleware sees the request once matching
//! is done and loaders are about to start, then sees the committed
//! [`NavigationState`]. Middleware observes only. It cannot veto, redirect or
//! replace data; use a loader redirect for that.
//!
//! Ordering follows priority. Higher priorities enter first and leave last,
//! so a navigation through `root` (priority 5) and `page` (priority 0) runs
//!
//! ```text
//! root.before_navigation
//!   page.before_navigation
//!   page.after_navigation
//! root.after_navigation
//! ```
//!
//! Ties keep match order, outermost route first.
//!
//! ```no_run
//! use data_router::{middleware_fn, Route};
//!
//! let route = Route::new("admin", "/admin").middleware(middleware_fn(
//!     |request| eprintln!("entering {}", request.to),
//!     |_, state| eprintln!("settled with {}", state.status),
//! ));
//! ```

use crate::resolve::MatchStack;
use crate::state::NavigationState;
use crate::trace_log;
use crate::NavigationRequest;
use std::sync::Arc;

pub trait RouteMiddleware: Send + Sync + 'static {
    /// Runs after matching, before any loader or action starts.
    fn before_navigation(&self, request: &NavigationRequest);

    /// Runs once `state` has been published. Not called for aborted navigations.
    fn after_navigation(&self, request: &NavigationRequest, state: &NavigationState);

    /// Label used in trace output.
    fn name(&self) -> &'static str {
        "anonymous"
    }

    fn priority(&self) -> i32 {
        0
    }
}

/// Build a [`RouteMiddleware`] out of a pair of closures.
pub const fn middleware_fn<B, A>(before: B, after: A) -> FnMiddleware<B, A>
where
    B: Fn(&NavigationRequest) + Send + Sync + 'static,
    A: Fn(&NavigationRequest, &NavigationState) + Send + Sync + 'static,
{
    FnMiddleware { before, after }
}

/// See [`middleware_fn`].
pub struct FnMiddleware<B, A> {
    before: B,
    after: A,
}

impl<B, A> RouteMiddleware for FnMiddleware<B, A>
where
    B: Fn(&NavigationRequest) + Send + Sync + 'static,
    A: Fn(&NavigationRequest, &NavigationState) + Send + Sync + 'static,
{
    fn before_navigation(&self, request: &NavigationRequest) {
        (self.before)(request);
    }

    fn after_navigation(&self, request: &NavigationRequest, state: &NavigationState) {
        (self.after)(request, state);
    }
}

// ============================================================================
// Chain
// ============================================================================

/// The middleware of one match stack, sorted for entry.
#[derive(Clone, Default)]
pub(crate) struct MiddlewareChain {
    layers: Vec<Arc<dyn RouteMiddleware>>,
}

impl MiddlewareChain {
    pub(crate) fn for_matches(matches: &MatchStack) -> Self {
        let mut layers: Vec<Arc<dyn RouteMiddleware>> = matches
            .iter()
            .flat_map(|entry| entry.route.handlers.middleware.iter().cloned())
            .collect();
        // sort_by_key is stable
        layers.sort_by_key(|layer| std::cmp::Reverse(layer.priority()));
        Self { layers }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub(crate) fn enter(&self, request: &NavigationRequest) {
        for layer in &self.layers {
            trace_log!("{} entering {}", layer.name(), request.to);
            layer.before_navigation(request);
        }
    }

    pub(crate) fn leave(&self, request: &NavigationRequest, state: &NavigationState) {
        for layer in self.layers.iter().rev() {
            trace_log!("{} leaving {} ({})", layer.name(), request.to, state.status);
            layer.after_navigation(request, state);
        }
    }
}

impl From<Vec<Arc<dyn RouteMiddleware>>> for MiddlewareChain {
    fn from(mut layers: Vec<Arc<dyn RouteMiddleware>>) -> Self {
        layers.sort_by_key(|layer| std::cmp::Reverse(layer.priority()));
        Self { layers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Trail = Arc<Mutex<Vec<String>>>;

    struct Tagged {
        tag: &'static str,
        rank: i32,
        trail: Trail,
    }

    impl RouteMiddleware for Tagged {
        fn before_navigation(&self, request: &NavigationRequest) {
            self.trail
                .lock()
                .unwrap()
                .push(format!("{}>{}", self.tag, request.to));
        }

        fn after_navigation(&self, _request: &NavigationRequest, state: &NavigationState) {
            self.trail
                .lock()
                .unwrap()
                .push(format!("{}<{}", self.tag, state.status.as_u16()));
        }

        fn name(&self) -> &'static str {
            self.tag
        }

        fn priority(&self) -> i32 {
            self.rank
        }
    }

    fn tagged(tag: &'static str, rank: i32, trail: &Trail) -> Arc<dyn RouteMiddleware> {
        Arc::new(Tagged {
            tag,
            rank,
            trail: Arc::clone(trail),
        })
    }

    #[test]
    fn test_closure_middleware_defaults() {
        let layer = middleware_fn(|_| {}, |_, _| {});
        assert_eq!(layer.name(), "anonymous");
        assert_eq!(layer.priority(), 0);
    }

    #[test]
    fn test_priority_enters_first_and_leaves_last() {
        let trail = Trail::default();
        let chain = MiddlewareChain::from(vec![
            tagged("low", -1, &trail),
            tagged("high", 5, &trail),
            tagged("mid", 0, &trail),
        ]);
        let request = NavigationRequest::new("/inbox".to_string());

        chain.enter(&request);
        chain.leave(&request, &NavigationState::default());

        assert_eq!(
            *trail.lock().unwrap(),
            vec![
                "high>/inbox",
                "mid>/inbox",
                "low>/inbox",
                "low<200",
                "mid<200",
                "high<200",
            ]
        );
    }

    #[test]
    fn test_equal_priorities_keep_insertion_order() {
        let trail = Trail::default();
        let chain = MiddlewareChain::from(vec![
            tagged("outer", 0, &trail),
            tagged("inner", 0, &trail),
        ]);

        chain.enter(&NavigationRequest::new("/".to_string()));

        assert_eq!(*trail.lock().unwrap(), vec!["outer>/", "inner>/"]);
    }

    #[test]
    fn test_empty_chain() {
        assert!(MiddlewareChain::default().is_empty());
        assert!(MiddlewareChain::for_matches(&MatchStack::new()).is_empty());
    }
}
