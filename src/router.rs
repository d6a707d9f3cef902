//! Client-side data router.
//!
//! [`DataRouter`] drives navigations end to end: resolve the target, run the
//! redirect chain with revalidation decided against the committed state,
//! then commit a whole new [`NavigationState`] in one pointer swap. Starting
//! a navigation aborts the one in flight; a navigation that is no longer the
//! newest when it finishes commits nothing.
//!
//! ```no_run
//! use data_router::{loader_fn, DataRouter, Route, RouteResponse, RouterConfig};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), data_router::RouterError> {
//! let router = DataRouter::new(
//!     vec![Route::new("root", "/")
//!         .loader(loader_fn(|_| async { Ok(RouteResponse::data(json!({"user": "ada"}))) }))],
//!     RouterConfig::default(),
//! )?;
//! router.initialize("/").await;
//! assert_eq!(router.state().loader_data("root"), Some(&json!({"user": "ada"})));
//! # Ok(())
//! # }
//! ```

use crate::abort::AbortController;
use crate::config::RouterConfig;
use crate::error::{ErrorResponse, NavigationResult, RouteError, RouterError};
use crate::fetcher::{Fetcher, FetcherOutcome, FetcherRegistry, FetcherState};
use crate::loader::DataRequest;
#[cfg(feature = "middleware")]
use crate::middleware::MiddlewareChain;
use crate::nested::with_basename;
use crate::params::{FormData, RouteParams};
use crate::pipeline::{action_target, load_route_data, submit, LoadFilter, RouteResult};
use crate::redirect::{
    classify_location, follow_redirects, has_index_flag, router_path, ChainOutcome,
    RedirectTarget,
};
use crate::registry::RouteRegistry;
use crate::resolve::{not_found_matches, MatchStack};
use crate::revalidation::{decide_revalidation, RevalidationContext, RevalidationTrigger};
use crate::route::{Route, RouteId};
use crate::state::{Location, Navigation, NavigationState, RouterState};
use crate::{debug_log, info_log, trace_log, warn_log};
use arc_swap::ArcSwap;
use http::{Method, StatusCode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

// ============================================================================
// NavigationRequest
// ============================================================================

/// What middleware sees of a navigation.
///
/// ```
/// use data_router::NavigationRequest;
///
/// let request = NavigationRequest::new("/dashboard".to_string());
/// assert_eq!(request.method, http::Method::GET);
/// assert!(request.from.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    /// Href of the committed location, unless this is the first navigation.
    pub from: Option<String>,
    pub to: String,
    pub method: Method,
    /// Params of the deepest match.
    pub params: RouteParams,
}

impl NavigationRequest {
    pub fn new(to: String) -> Self {
        Self {
            from: None,
            to,
            method: Method::GET,
            params: RouteParams::new(),
        }
    }
}

// ============================================================================
// DataRouter
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavigateOp {
    Push,
    Replace,
    Back,
    Forward,
    /// Re-run loaders for the current entry.
    Revalidate,
}

/// Why the loaders of a navigation are reconsidered, beyond what its own
/// request says.
#[derive(Debug, Clone)]
enum Cause {
    Navigation,
    Explicit,
    /// A fetcher submission settled outside of any navigation.
    FetcherSubmission {
        method: Method,
        status: StatusCode,
        result: Option<serde_json::Value>,
    },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DataRouter {
    registry: Arc<RouteRegistry>,
    origin: Url,
    state: ArcSwap<NavigationState>,
    history: Mutex<RouterState>,
    pending: Mutex<Option<AbortController>>,
    fetchers: FetcherRegistry,
    /// Serializes the check-then-swap of a commit.
    commit: Mutex<()>,
}

impl DataRouter {
    pub fn new(routes: Vec<Route>, config: RouterConfig) -> Result<Self, RouterError> {
        Self::from_registry(Arc::new(RouteRegistry::new(routes, config)?))
    }

    pub fn from_registry(registry: Arc<RouteRegistry>) -> Result<Self, RouterError> {
        let origin = registry.config().origin_url()?;
        Ok(Self {
            registry,
            origin,
            state: ArcSwap::from_pointee(NavigationState::default()),
            history: Mutex::new(RouterState::new()),
            pending: Mutex::new(None),
            fetchers: FetcherRegistry::new(),
            commit: Mutex::new(()),
        })
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Last committed state.
    pub fn state(&self) -> Arc<NavigationState> {
        self.state.load_full()
    }

    pub fn current_path(&self) -> String {
        lock(&self.history).current_path().to_string()
    }

    pub fn can_go_back(&self) -> bool {
        lock(&self.history).can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        lock(&self.history).can_go_forward()
    }

    /// Load `href` as the first entry, replacing the initial history slot.
    pub async fn initialize(&self, href: &str) -> NavigationResult {
        self.navigate_href(href, Method::GET, None, NavigateOp::Replace)
            .await
    }

    /// GET navigation pushing a history entry.
    pub async fn navigate(&self, href: &str) -> NavigationResult {
        self.navigate_href(href, Method::GET, None, NavigateOp::Push)
            .await
    }

    /// GET navigation replacing the current history entry.
    pub async fn replace(&self, href: &str) -> NavigationResult {
        self.navigate_href(href, Method::GET, None, NavigateOp::Replace)
            .await
    }

    /// Submit `form` to the action addressed by `href`.
    pub async fn submit(&self, href: &str, method: Method, form: FormData) -> NavigationResult {
        self.navigate_href(href, method, Some(form), NavigateOp::Push)
            .await
    }

    /// Re-run loaders of the current location.
    pub async fn revalidate(&self) -> NavigationResult {
        let href = self.state().location.href();
        self.navigate_href(&href, Method::GET, None, NavigateOp::Revalidate)
            .await
    }

    /// Go back in history; `None` at the first entry.
    pub async fn back(&self) -> Option<NavigationResult> {
        let target = lock(&self.history).peek(-1)?.to_string();
        Some(
            self.navigate_href(&target, Method::GET, None, NavigateOp::Back)
                .await,
        )
    }

    /// Go forward in history; `None` at the last entry.
    pub async fn forward(&self) -> Option<NavigationResult> {
        let target = lock(&self.history).peek(1)?.to_string();
        Some(
            self.navigate_href(&target, Method::GET, None, NavigateOp::Forward)
                .await,
        )
    }

    /// Absolute URL of a router-relative href.
    pub fn url_for(&self, href: &str) -> Result<Url, RouterError> {
        let split = href.find(['?', '#']).unwrap_or(href.len());
        let (path, rest) = href.split_at(split);
        let full = format!(
            "{}{}",
            with_basename(path, &self.registry.config().basename),
            rest
        );
        self.origin.join(&full).map_err(|e| RouterError::InvalidUrl {
            url: href.to_string(),
            reason: e.to_string(),
        })
    }

    async fn navigate_href(
        &self,
        href: &str,
        method: Method,
        form: Option<FormData>,
        op: NavigateOp,
    ) -> NavigationResult {
        let cause = if op == NavigateOp::Revalidate {
            Cause::Explicit
        } else {
            Cause::Navigation
        };
        match self.url_for(href) {
            Ok(url) => self.run_navigation(url, method, form, op, cause).await,
            Err(e) => NavigationResult::Error(e),
        }
    }

    /// Revalidate the current location on behalf of a settled fetcher
    /// submission, so route policies see its method and result.
    async fn revalidate_after(&self, submission: Cause) -> NavigationResult {
        let href = self.state().location.href();
        match self.url_for(&href) {
            Ok(url) => {
                self.run_navigation(url, Method::GET, None, NavigateOp::Revalidate, submission)
                    .await
            }
            Err(e) => NavigationResult::Error(e),
        }
    }

    // ========================================================================
    // Navigation pipeline
    // ========================================================================

    async fn run_navigation(
        &self,
        url: Url,
        method: Method,
        form: Option<FormData>,
        op: NavigateOp,
        cause: Cause,
    ) -> NavigationResult {
        let nav_id = lock(&self.history).start_navigation();
        let controller = AbortController::new();
        if let Some(previous) = lock(&self.pending).replace(controller.clone()) {
            debug_log!("Aborting superseded navigation");
            previous.abort();
        }

        let current = self.state();
        let basename = self.registry.config().basename.clone();
        let path = match router_path(&url, &basename) {
            Ok(path) => path,
            Err(_) => return self.commit_not_found(nav_id, &url, url.path(), op),
        };
        let location = Location::from_url(&url, path.clone());
        info_log!(
            "Navigation {:?} {}: '{}' → '{}'",
            op,
            method,
            current.location,
            location
        );

        let mut request = DataRequest::new(method.clone(), url.clone())
            .with_signal(controller.signal());
        if request.is_mutation() {
            request.form = Some(form.unwrap_or_default());
        }

        let Some(matches) = self.registry.resolve(&path) else {
            return self.commit_not_found(nav_id, &url, &path, op);
        };

        let nav_request = NavigationRequest {
            from: current.initialized.then(|| current.location.href()),
            to: location.href(),
            method: method.clone(),
            params: matches.params(),
        };
        #[cfg(feature = "middleware")]
        MiddlewareChain::for_matches(&matches).enter(&nav_request);

        let in_flight = if request.is_mutation() {
            Navigation::Submitting {
                location: location.clone(),
                method: method.clone(),
            }
        } else {
            Navigation::Loading { location }
        };
        self.publish_if_current(nav_id, current.with_navigation(in_flight));

        let current_url = current
            .initialized
            .then(|| self.url_for(&current.location.href()).ok())
            .flatten();
        let outcome = follow_redirects(&self.registry, request, |req, next_matches, action| {
            revalidation_filter(
                &current,
                current_url.as_ref(),
                req,
                next_matches,
                action,
                &method,
                &cause,
            )
        })
        .await;

        if !lock(&self.history).is_navigation_current(nav_id) {
            debug_log!("Navigation {} superseded, discarding results", nav_id);
            return NavigationResult::Aborted;
        }

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(RouterError::Aborted) => return NavigationResult::Aborted,
            Err(RouterError::RouteNotFound { path }) => {
                return self.commit_not_found(nav_id, &url, &path, op);
            }
            Err(e) => {
                warn_log!("Navigation to '{}' failed: {}", path, e);
                self.publish_if_current(nav_id, current.with_navigation(Navigation::Idle));
                return NavigationResult::Error(e);
            }
        };

        match outcome {
            ChainOutcome::External { location, .. } => {
                info_log!("Navigation left the app for '{}'", location);
                self.publish_if_current(nav_id, current.with_navigation(Navigation::Idle));
                NavigationResult::External { location }
            }
            ChainOutcome::Complete {
                context, request, ..
            } => {
                let final_path = match router_path(&request.url, &basename) {
                    Ok(path) => path,
                    Err(e) => return NavigationResult::Error(e),
                };
                let location = Location::from_url(&request.url, final_path);

                let mut loader_data: BTreeMap<RouteId, serde_json::Value> = context
                    .matches
                    .iter()
                    .filter(|e| e.route.has_loader() && !context.loaded.contains(&e.route.id))
                    .filter_map(|e| {
                        let data = current.loader_data.get(&e.route.id)?;
                        Some((e.route.id.clone(), data.clone()))
                    })
                    .collect();
                loader_data.extend(context.loader_data.clone());
                if let Some(cutoff) = context.error_cutoff() {
                    let keep: BTreeSet<&RouteId> = context.matches.entries()[..=cutoff]
                        .iter()
                        .map(|e| &e.route.id)
                        .collect();
                    loader_data.retain(|id, _| keep.contains(id));
                }

                let next = NavigationState {
                    location: location.clone(),
                    matches: context.matches.clone(),
                    loader_data,
                    action_data: context.action_data.clone(),
                    errors: context.errors.clone(),
                    navigation: Navigation::Idle,
                    status: context.status,
                    initialized: true,
                };
                self.commit(nav_id, next, op, &nav_request)
            }
        }
    }

    fn commit_not_found(
        &self,
        nav_id: usize,
        url: &Url,
        path: &str,
        op: NavigateOp,
    ) -> NavigationResult {
        warn_log!("No route matches '{}'", path);
        let matches = not_found_matches(&self.registry.snapshot());
        let errors = matches.root().map(|root| {
            BTreeMap::from([(
                root.route.id.clone(),
                RouteError::from(ErrorResponse::not_found(path)),
            )])
        });
        let location = Location::from_url(url, path.to_string());
        let next = NavigationState {
            location: location.clone(),
            matches,
            loader_data: BTreeMap::new(),
            action_data: None,
            errors,
            navigation: Navigation::Idle,
            status: StatusCode::NOT_FOUND,
            initialized: true,
        };
        let request = NavigationRequest::new(location.href());
        match self.commit(nav_id, next, op, &request) {
            NavigationResult::Success { path } => NavigationResult::NotFound { path },
            other => other,
        }
    }

    /// Swap in `next` if `nav_id` is still the newest navigation.
    fn commit(
        &self,
        nav_id: usize,
        next: NavigationState,
        op: NavigateOp,
        request: &NavigationRequest,
    ) -> NavigationResult {
        let committed = {
            let _guard = lock(&self.commit);
            let mut history = lock(&self.history);
            if !history.is_navigation_current(nav_id) {
                return NavigationResult::Aborted;
            }
            let href = next.location.href();
            let event = match op {
                NavigateOp::Push if history.current_path() != href => Some(history.push(href)),
                NavigateOp::Push | NavigateOp::Replace | NavigateOp::Revalidate => {
                    Some(history.replace(href))
                }
                NavigateOp::Back => history.back(),
                NavigateOp::Forward => history.forward(),
            };
            if let Some(event) = &event {
                trace_log!("History {:?}: {} → {}", event.action, event.from, event.to);
            }
            let next = Arc::new(next);
            self.state.store(Arc::clone(&next));
            *lock(&self.pending) = None;
            next
        };

        #[cfg(feature = "middleware")]
        {
            let chain = MiddlewareChain::for_matches(&committed.matches);
            if !chain.is_empty() {
                chain.leave(request, &committed);
            }
        }
        #[cfg(not(feature = "middleware"))]
        let _ = request;

        info_log!(
            "Navigation complete: '{}' ({}, {} matches)",
            committed.location,
            committed.status,
            committed.matches.len()
        );
        NavigationResult::Success {
            path: committed.location.href(),
        }
    }

    /// Publish a non-data change (the in-flight marker) unless superseded.
    fn publish_if_current(&self, nav_id: usize, state: NavigationState) {
        let _guard = lock(&self.commit);
        if lock(&self.history).is_navigation_current(nav_id) {
            self.state.store(Arc::new(state));
        }
    }

    // ========================================================================
    // Fetchers
    // ========================================================================

    pub fn fetcher(&self, key: &str) -> Option<Fetcher> {
        self.fetchers.get(key)
    }

    /// Abort and remove a fetcher.
    pub fn delete_fetcher(&self, key: &str) -> bool {
        self.fetchers.delete(key)
    }

    pub fn fetcher_keys(&self) -> Vec<String> {
        self.fetchers.keys()
    }

    /// Run the loader addressed by `href` under fetcher `key`.
    ///
    /// A redirect navigates the router; the fetcher keeps its previous data.
    pub async fn fetch(&self, key: &str, href: &str) -> Result<Fetcher, RouterError> {
        let url = self.url_for(href)?;
        let ticket = self.fetchers.begin(key, FetcherState::Loading);
        let request = DataRequest::get(url.clone()).with_signal(ticket.signal.clone());

        let result = match self.fetcher_target(&url) {
            Err(error) => RouteResult::error(error),
            Ok((matches, target)) => {
                let has_loader = matches
                    .find(target.as_str())
                    .is_some_and(|e| e.route.has_loader());
                if has_loader {
                    let filter = LoadFilter::only([target.clone()]);
                    match load_route_data(&matches, &request, &filter).await {
                        Ok(mut results) => match results.pop() {
                            Some((_, result)) => result,
                            None => RouteResult::error(ErrorResponse::no_loader(&target)),
                        },
                        Err(e) => {
                            self.fetchers.settle(&ticket);
                            return Err(e);
                        }
                    }
                } else {
                    RouteResult::error(ErrorResponse::no_loader(&target))
                }
            }
        };

        self.finish_fetcher(&ticket, &request.url, result).await
    }

    /// Submit `form` to the action addressed by `href` under fetcher `key`.
    ///
    /// When the submission settles and no navigation is in flight, the
    /// current location is revalidated.
    pub async fn fetcher_submit(
        &self,
        key: &str,
        href: &str,
        method: Method,
        form: FormData,
    ) -> Result<Fetcher, RouterError> {
        let url = self.url_for(href)?;
        let ticket = self.fetchers.begin(key, FetcherState::Submitting);
        let request = DataRequest::new(method, url.clone())
            .with_form(form)
            .with_signal(ticket.signal.clone());

        let result = match self.fetcher_target(&url) {
            Err(error) => RouteResult::error(error),
            Ok((matches, target)) => match submit(&matches, &target, &request).await {
                Ok((_, result)) => result,
                Err(e) => {
                    self.fetchers.settle(&ticket);
                    return Err(e);
                }
            },
        };

        let redirected = result.is_redirect();
        let submission = Cause::FetcherSubmission {
            method: request.method.clone(),
            status: result.status(),
            result: result.data().cloned(),
        };
        let fetcher = self.finish_fetcher(&ticket, &request.url, result).await?;
        if !redirected && self.state().navigation.is_idle() && self.state().initialized {
            debug_log!("Fetcher '{}' settled, revalidating", key);
            self.revalidate_after(submission).await;
        }
        Ok(fetcher)
    }

    fn fetcher_target(&self, url: &Url) -> Result<(MatchStack, RouteId), ErrorResponse> {
        let path = router_path(url, &self.registry.config().basename)
            .map_err(|_| ErrorResponse::not_found(url.path()))?;
        let matches = self
            .registry
            .resolve(&path)
            .ok_or_else(|| ErrorResponse::not_found(&path))?;
        let target = action_target(&matches, has_index_flag(url))
            .ok_or_else(|| ErrorResponse::not_found(&path))?;
        Ok((matches, target))
    }

    async fn finish_fetcher(
        &self,
        ticket: &crate::fetcher::FetcherTicket,
        url: &Url,
        result: RouteResult,
    ) -> Result<Fetcher, RouterError> {
        match result {
            RouteResult::Data(response) => {
                self.fetchers.complete(
                    ticket,
                    FetcherOutcome::Data {
                        data: response.data,
                        status: response.status,
                    },
                );
            }
            RouteResult::Error { error, .. } => {
                self.fetchers.complete(ticket, FetcherOutcome::Error(error));
            }
            RouteResult::Redirect(response) => {
                self.fetchers.settle(ticket);
                let location = response.location().unwrap_or("/");
                match classify_location(url, location)? {
                    RedirectTarget::Internal(next) => {
                        debug_log!("Fetcher '{}' redirected to '{}'", ticket.key, next);
                        self.run_navigation(
                            next,
                            Method::GET,
                            None,
                            NavigateOp::Push,
                            Cause::Navigation,
                        )
                        .await;
                    }
                    RedirectTarget::External(location) => {
                        warn_log!(
                            "Fetcher '{}' redirected off-origin to '{}'",
                            ticket.key,
                            location
                        );
                    }
                }
            }
        }
        self.fetchers
            .get(&ticket.key)
            .ok_or(RouterError::Aborted)
    }
}

impl std::fmt::Debug for DataRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRouter")
            .field("origin", &self.origin.as_str())
            .field("location", &self.state().location.href())
            .field("fetchers", &self.fetchers.len())
            .finish()
    }
}

/// Loader selection of one hop, decided against the committed state. Routes
/// not selected keep their current data if the hop settles the chain.
fn revalidation_filter(
    current: &NavigationState,
    current_url: Option<&Url>,
    request: &DataRequest,
    next_matches: &MatchStack,
    action: Option<&(RouteId, RouteResult)>,
    submitted_with: &Method,
    cause: &Cause,
) -> LoadFilter {
    let loaded: BTreeSet<RouteId> = current.loader_data.keys().cloned().collect();
    let trigger = if !current.initialized {
        RevalidationTrigger::InitialLoad
    } else if let Some((_, result)) = action {
        // Later hops of the chain run as GET; report the submission's method.
        RevalidationTrigger::Submission {
            method: submitted_with,
            action_status: Some(result.status()),
            action_result: result.data(),
        }
    } else {
        match cause {
            Cause::Navigation => RevalidationTrigger::Navigation,
            Cause::Explicit => RevalidationTrigger::Explicit,
            Cause::FetcherSubmission {
                method,
                status,
                result,
            } => RevalidationTrigger::Submission {
                method,
                action_status: Some(*status),
                action_result: result.as_ref(),
            },
        }
    };

    let selected = decide_revalidation(&RevalidationContext {
        current_url,
        next_url: &request.url,
        current_matches: current.initialized.then_some(&current.matches),
        next_matches,
        loaded_routes: &loaded,
        trigger,
    });
    let skip = next_matches
        .iter()
        .map(|e| e.route.id.clone())
        .filter(|id| !selected.contains(id))
        .collect();
    LoadFilter {
        only: None,
        skip,
    }
}
