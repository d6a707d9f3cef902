//! Data loader/action pipeline.
//!
//! One hop of data work for a resolved [`MatchStack`]:
//!
//! 1. For a mutation, [`submit`] runs exactly one action, alone.
//! 2. [`load_route_data`] runs every selected loader concurrently against
//!    clones of the same [`DataRequest`] (and so the same abort signal).
//! 3. [`process_results`] folds both into a [`DataContext`]: headers are
//!    appended, errors bubble to their nearest error boundary, data below the
//!    shallowest catching boundary is dropped and the response status is
//!    chosen.
//!
//! [`run_hop`] strings the three together. Failures never escape as Rust
//! errors: a loader that returns an error or panics becomes a
//! [`RouteResult::Error`] tagged with its route id. Only an abort does.

use crate::error::{ErrorResponse, RouteError, RouterError};
use crate::loader::{DataFunctionArgs, DataRequest, DataResult, RouteResponse, RouteThrow};
use crate::resolve::{MatchEntry, MatchStack};
use crate::route::RouteId;
use crate::{debug_log, error_log, trace_log, warn_log};
use futures::future::join_all;
use futures::FutureExt;
use http::header::LOCATION;
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;

// ============================================================================
// Results
// ============================================================================

/// Outcome of one loader or action.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    Data(RouteResponse),
    Redirect(RouteResponse),
    Error { error: RouteError, headers: HeaderMap },
}

impl RouteResult {
    /// Classify what a loader or action produced.
    pub fn from_data_result(result: DataResult) -> Self {
        match result {
            Ok(response) | Err(RouteThrow::Response(response)) if response.is_redirect() => {
                RouteResult::Redirect(response)
            }
            Ok(response) => RouteResult::Data(response),
            Err(RouteThrow::Response(response)) => RouteResult::Error {
                error: RouteError::Response(ErrorResponse::new(
                    response.status.as_u16(),
                    response.data,
                )),
                headers: response.headers,
            },
            Err(RouteThrow::Error(message)) => RouteResult::Error {
                error: RouteError::thrown(message),
                headers: HeaderMap::new(),
            },
        }
    }

    pub fn error(error: impl Into<RouteError>) -> Self {
        RouteResult::Error {
            error: error.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        match self {
            RouteResult::Data(response) | RouteResult::Redirect(response) => &response.headers,
            RouteResult::Error { headers, .. } => headers,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RouteResult::Data(response) | RouteResult::Redirect(response) => response.status,
            RouteResult::Error { error, .. } => {
                StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            RouteResult::Data(response) => Some(&response.data),
            _ => None,
        }
    }

    pub fn route_error(&self) -> Option<&RouteError> {
        match self {
            RouteResult::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, RouteResult::Redirect(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RouteResult::Error { .. })
    }
}

/// Which matched loaders to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadFilter {
    /// When set, only these routes.
    pub only: Option<BTreeSet<RouteId>>,
    /// Never these routes.
    pub skip: BTreeSet<RouteId>,
}

impl LoadFilter {
    /// Every matched loader.
    pub fn all() -> Self {
        Self::default()
    }

    /// No loader at all.
    pub fn none() -> Self {
        Self {
            only: Some(BTreeSet::new()),
            skip: BTreeSet::new(),
        }
    }

    pub fn only(ids: impl IntoIterator<Item = RouteId>) -> Self {
        Self {
            only: Some(ids.into_iter().collect()),
            skip: BTreeSet::new(),
        }
    }

    pub fn skipping(ids: impl IntoIterator<Item = RouteId>) -> Self {
        Self {
            only: None,
            skip: ids.into_iter().collect(),
        }
    }

    pub fn includes(&self, id: &RouteId) -> bool {
        !self.skip.contains(id) && self.only.as_ref().map_or(true, |only| only.contains(id))
    }

    /// Narrow to routes in `allowed` as well.
    pub fn restrict(mut self, allowed: &BTreeSet<RouteId>) -> Self {
        self.only = Some(match self.only {
            Some(only) => only.intersection(allowed).cloned().collect(),
            None => allowed.clone(),
        });
        self
    }
}

// ============================================================================
// Running loaders and actions
// ============================================================================

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

fn args_for(entry: &MatchEntry, request: &DataRequest) -> DataFunctionArgs {
    DataFunctionArgs {
        request: request.clone(),
        params: entry.params.clone(),
    }
}

/// Run the selected loaders of `matches` concurrently.
///
/// Results come back in match order. If the request's signal fires before
/// every loader settles, all results are discarded and
/// [`RouterError::Aborted`] is returned.
pub async fn load_route_data(
    matches: &MatchStack,
    request: &DataRequest,
    filter: &LoadFilter,
) -> Result<Vec<(RouteId, RouteResult)>, RouterError> {
    let pending: Vec<_> = matches
        .iter()
        .filter(|entry| filter.includes(&entry.route.id))
        .filter_map(|entry| {
            let loader = entry.route.handlers.loader.clone()?;
            let id = entry.route.id.clone();
            let args = args_for(entry, request);
            Some(async move {
                let outcome = AssertUnwindSafe(async move { loader.load(args).await })
                    .catch_unwind()
                    .await;
                let result = match outcome {
                    Ok(result) => RouteResult::from_data_result(result),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error_log!("Loader for '{}' panicked: {}", id, message);
                        RouteResult::error(RouteError::thrown(message))
                    }
                };
                trace_log!("Loader '{}' settled with {}", id, result.status());
                (id, result)
            })
        })
        .collect();

    debug_log!(
        "Loading {} routes for '{}'",
        pending.len(),
        request.pathname()
    );
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let signal = request.signal.clone();
    tokio::select! {
        biased;
        () = signal.aborted() => {
            warn_log!("Loaders for '{}' aborted", request.pathname());
            Err(RouterError::Aborted)
        }
        results = join_all(pending) => {
            if signal.is_aborted() {
                Err(RouterError::Aborted)
            } else {
                Ok(results)
            }
        }
    }
}

/// Run `target`'s action.
///
/// A target without an action yields a 405 error response rather than a
/// Rust error, so it bubbles like any other route error.
pub async fn submit(
    matches: &MatchStack,
    target: &RouteId,
    request: &DataRequest,
) -> Result<(RouteId, RouteResult), RouterError> {
    let entry = matches
        .find(target.as_str())
        .ok_or_else(|| RouterError::UnknownRoute {
            route_id: target.clone(),
        })?;

    let Some(action) = entry.route.handlers.action.clone() else {
        warn_log!("{} to '{}' which has no action", request.method, target);
        let error = ErrorResponse::method_not_allowed(request.method.as_str(), target);
        return Ok((target.clone(), RouteResult::error(error)));
    };

    debug_log!("Running action '{}' for '{}'", target, request.pathname());
    let args = args_for(entry, request);
    let run = AssertUnwindSafe(async move { action.run(args).await }).catch_unwind();

    let signal = request.signal.clone();
    let outcome = tokio::select! {
        biased;
        () = signal.aborted() => return Err(RouterError::Aborted),
        outcome = run => outcome,
    };

    let result = match outcome {
        Ok(result) => RouteResult::from_data_result(result),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error_log!("Action for '{}' panicked: {}", target, message);
            RouteResult::error(RouteError::thrown(message))
        }
    };
    Ok((target.clone(), result))
}

/// Route a submission is addressed to.
///
/// With `index` (the `?index` query flag) and an index leaf, the leaf.
/// Otherwise the deepest match that contributes a path segment; index and
/// pathless routes are skipped, the root always qualifies.
pub fn action_target(matches: &MatchStack, index: bool) -> Option<RouteId> {
    let leaf = matches.leaf()?;
    if index && leaf.route.is_index() {
        return Some(leaf.route.id.clone());
    }
    matches
        .iter()
        .rev()
        .find(|entry| {
            entry.depth == 0 || (entry.route.contributes_path() && !entry.route.segments.is_empty())
        })
        .map(|entry| entry.route.id.clone())
}

/// Nearest route at or above `route_id` exposing an error boundary; the root
/// match when none does.
pub fn find_nearest_boundary(matches: &MatchStack, route_id: &str) -> Option<RouteId> {
    let end = matches.position(route_id).map_or(matches.len().min(1), |p| p + 1);
    matches.entries()[..end]
        .iter()
        .rev()
        .find(|entry| entry.route.has_error_boundary())
        .or_else(|| matches.root())
        .map(|entry| entry.route.id.clone())
}

/// True when `route_id` or one of its ancestors exposes an error boundary,
/// as opposed to the error falling back to the root.
fn is_caught(matches: &MatchStack, route_id: &str) -> bool {
    matches.position(route_id).is_some_and(|p| {
        matches.entries()[..=p]
            .iter()
            .any(|entry| entry.route.has_error_boundary())
    })
}

/// Ids of `boundary` and its ancestors in `matches`.
pub fn routes_through(matches: &MatchStack, boundary: &str) -> BTreeSet<RouteId> {
    let end = matches.position(boundary).map_or(0, |p| p + 1);
    matches.entries()[..end]
        .iter()
        .map(|entry| entry.route.id.clone())
        .collect()
}

// ============================================================================
// Folding results
// ============================================================================

/// Folded outcome of one hop.
#[derive(Debug, Clone)]
pub struct DataContext {
    pub matches: MatchStack,
    pub loader_data: BTreeMap<RouteId, Value>,
    pub action_data: Option<BTreeMap<RouteId, Value>>,
    /// Keyed by boundary.
    pub errors: Option<BTreeMap<RouteId, RouteError>>,
    /// Keyed by the route that failed.
    pub thrown: BTreeMap<RouteId, RouteError>,
    pub status: StatusCode,
    /// Every header of every result, appended in action-then-match order.
    pub headers: HeaderMap,
    /// First redirect: the action's, else the first loader's in match order.
    pub redirect: Option<RouteResponse>,
    pub action_status: Option<StatusCode>,
    /// Routes whose loaders ran in this hop.
    pub loaded: BTreeSet<RouteId>,
}

impl DataContext {
    /// Position of the shallowest boundary holding an error.
    pub fn error_cutoff(&self) -> Option<usize> {
        self.errors
            .as_ref()?
            .keys()
            .filter_map(|id| self.matches.position(id.as_str()))
            .min()
    }
}

/// Fold an action result and loader results into a [`DataContext`].
///
/// `loaders` must be in match order (as [`load_route_data`] returns them).
pub fn process_results(
    matches: &MatchStack,
    action: Option<(RouteId, RouteResult)>,
    loaders: Vec<(RouteId, RouteResult)>,
) -> DataContext {
    let mut headers = HeaderMap::new();
    let mut errors: BTreeMap<RouteId, RouteError> = BTreeMap::new();
    let mut thrown = BTreeMap::new();
    // Status of the first error, and whether a real boundary caught it.
    let mut first_error: Option<(u16, bool)> = None;
    let mut redirect: Option<RouteResponse> = None;
    let mut action_data = None;
    let mut action_status = None;

    let mut record_error = |id: &RouteId, error: &RouteError| {
        first_error.get_or_insert((error.status(), is_caught(matches, id.as_str())));
        thrown.insert(id.clone(), error.clone());
        if let Some(boundary) = find_nearest_boundary(matches, id.as_str()) {
            trace_log!("Error in '{}' caught by '{}'", id, boundary);
            errors.entry(boundary).or_insert_with(|| error.clone());
        }
    };

    if let Some((id, result)) = &action {
        append_headers(&mut headers, result.headers());
        action_status = Some(result.status());
        match result {
            RouteResult::Data(response) => {
                action_data = Some(BTreeMap::from([(id.clone(), response.data.clone())]));
            }
            RouteResult::Redirect(response) => redirect = Some(response.clone()),
            RouteResult::Error { error, .. } => record_error(id, error),
        }
    }

    let mut loaded = BTreeSet::new();
    let mut loader_data = BTreeMap::new();
    let mut deepest_loader_status = None;
    for (id, result) in &loaders {
        loaded.insert(id.clone());
        append_headers(&mut headers, result.headers());
        match result {
            RouteResult::Data(response) => {
                if response.status != StatusCode::OK {
                    deepest_loader_status = Some(response.status);
                }
                loader_data.insert(id.clone(), response.data.clone());
            }
            RouteResult::Redirect(response) => {
                redirect.get_or_insert_with(|| response.clone());
            }
            RouteResult::Error { error, .. } => record_error(id, error),
        }
    }

    let mut context = DataContext {
        matches: matches.clone(),
        loader_data,
        action_data,
        errors: (!errors.is_empty()).then_some(errors),
        thrown,
        status: StatusCode::OK,
        headers,
        redirect,
        action_status,
        loaded,
    };

    if let Some(cutoff) = context.error_cutoff() {
        let keep: BTreeSet<RouteId> = matches.entries()[..=cutoff]
            .iter()
            .map(|e| e.route.id.clone())
            .collect();
        context.loader_data.retain(|id, _| keep.contains(id));
    }

    context.status = if let Some(redirect) = &context.redirect {
        redirect.status
    } else if let Some((status, caught)) = first_error {
        if caught {
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    } else if let Some(status) = context.action_status {
        status
    } else {
        deepest_loader_status.unwrap_or(StatusCode::OK)
    };

    context
}

fn append_headers(into: &mut HeaderMap, from: &HeaderMap) {
    for (name, value) in from {
        if name == LOCATION {
            continue;
        }
        into.append(name.clone(), value.clone());
    }
}

/// Run one hop: the action (if `target` is set), then the loaders chosen by
/// `decide`, which sees the action result first.
///
/// When the action errors, loaders below its boundary are excluded whatever
/// `decide` returned.
pub async fn run_hop<F>(
    matches: &MatchStack,
    request: &DataRequest,
    target: Option<&RouteId>,
    decide: F,
) -> Result<DataContext, RouterError>
where
    F: FnOnce(Option<&(RouteId, RouteResult)>) -> LoadFilter,
{
    let action = match target {
        Some(target) => Some(submit(matches, target, request).await?),
        None => None,
    };

    let mut filter = decide(action.as_ref());
    if let Some((id, RouteResult::Error { .. })) = &action {
        if let Some(boundary) = find_nearest_boundary(matches, id.as_str()) {
            filter = filter.restrict(&routes_through(matches, boundary.as_str()));
        }
    }

    let loaders = load_route_data(matches, request, &filter).await?;
    Ok(process_results(matches, action, loaders))
}
