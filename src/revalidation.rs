//! Revalidation policy.
//!
//! After a navigation or mutation, [`decide_revalidation`] picks which
//! matched loaders run. The rules, per matched route that has a loader:
//!
//! 1. Initial load, a route that was not matched before, or a route with no
//!    current data: always load. The per-route override is not consulted.
//! 2. Otherwise a default is computed:
//!    - after a submission or an explicit revalidation: `true`;
//!    - after a GET navigation: `true` if the href is unchanged (reload),
//!      the search string changed, or the route's own matched pathname
//!      changed (`/list/1` → `/list/2` for `:id`, but not for its parent).
//! 3. A route's [`ShouldRevalidate`] receives the default and has the final
//!    word for that route only; descendants decide for themselves.

use crate::resolve::MatchStack;
use crate::route::RouteId;
use crate::{debug_log, trace_log};
use http::{Method, StatusCode};
use serde_json::Value;
use std::collections::BTreeSet;
use url::Url;

/// Inputs of a per-route revalidation override.
#[derive(Debug, Clone)]
pub struct ShouldRevalidateArgs<'a> {
    pub current_url: &'a Url,
    pub next_url: &'a Url,
    pub current_params: &'a crate::RouteParams,
    pub next_params: &'a crate::RouteParams,
    /// Method of the submission that triggered this revalidation.
    pub form_method: Option<&'a Method>,
    pub action_status: Option<StatusCode>,
    pub action_result: Option<&'a Value>,
    pub default_should_revalidate: bool,
}

/// Per-route override of the default revalidation decision.
pub trait ShouldRevalidate: Send + Sync + 'static {
    fn should_revalidate(&self, args: &ShouldRevalidateArgs<'_>) -> bool;
}

/// Create a [`ShouldRevalidate`] from a closure.
///
/// ```
/// use data_router::revalidation::should_revalidate_fn;
///
/// // Only re-run after mutations.
/// let policy = should_revalidate_fn(|args| args.form_method.is_some());
/// # let _ = policy;
/// ```
pub const fn should_revalidate_fn<F>(f: F) -> FnShouldRevalidate<F>
where
    F: Fn(&ShouldRevalidateArgs<'_>) -> bool + Send + Sync + 'static,
{
    FnShouldRevalidate { f }
}

/// Policy created from a closure via [`should_revalidate_fn`].
pub struct FnShouldRevalidate<F> {
    f: F,
}

impl<F> ShouldRevalidate for FnShouldRevalidate<F>
where
    F: Fn(&ShouldRevalidateArgs<'_>) -> bool + Send + Sync + 'static,
{
    fn should_revalidate(&self, args: &ShouldRevalidateArgs<'_>) -> bool {
        (self.f)(args)
    }
}

/// What caused the loaders to be reconsidered.
#[derive(Debug, Clone)]
pub enum RevalidationTrigger<'a> {
    InitialLoad,
    /// GET navigation (link, back/forward, redirect target).
    Navigation,
    Submission {
        method: &'a Method,
        action_status: Option<StatusCode>,
        action_result: Option<&'a Value>,
    },
    /// Caller-requested revalidation of the current location.
    Explicit,
}

/// Everything [`decide_revalidation`] looks at.
#[derive(Debug, Clone)]
pub struct RevalidationContext<'a> {
    /// `None` before the first navigation commits.
    pub current_url: Option<&'a Url>,
    pub next_url: &'a Url,
    pub current_matches: Option<&'a MatchStack>,
    pub next_matches: &'a MatchStack,
    /// Routes that currently hold loader data.
    pub loaded_routes: &'a BTreeSet<RouteId>,
    pub trigger: RevalidationTrigger<'a>,
}

/// Route ids whose loaders should run.
pub fn decide_revalidation(ctx: &RevalidationContext<'_>) -> BTreeSet<RouteId> {
    let mut selected = BTreeSet::new();

    let (current_url, current_matches) = match (ctx.current_url, ctx.current_matches) {
        (Some(url), Some(matches)) if !matches!(ctx.trigger, RevalidationTrigger::InitialLoad) => {
            (url, matches)
        }
        _ => {
            selected.extend(
                ctx.next_matches
                    .iter()
                    .filter(|e| e.route.has_loader())
                    .map(|e| e.route.id.clone()),
            );
            debug_log!("Initial load: loading {} routes", selected.len());
            return selected;
        }
    };

    let href_unchanged = current_url.as_str() == ctx.next_url.as_str();
    let search_changed = current_url.query() != ctx.next_url.query();

    let (form_method, action_status, action_result) = match &ctx.trigger {
        RevalidationTrigger::Submission {
            method,
            action_status,
            action_result,
        } => (Some(*method), *action_status, *action_result),
        _ => (None, None, None),
    };

    for next in ctx.next_matches {
        let route = &next.route;
        if !route.has_loader() {
            continue;
        }

        let Some(current) = current_matches.find(route.id.as_str()) else {
            trace_log!("Revalidate '{}': newly matched", route.id);
            selected.insert(route.id.clone());
            continue;
        };
        if !ctx.loaded_routes.contains(&route.id) {
            trace_log!("Revalidate '{}': no current data", route.id);
            selected.insert(route.id.clone());
            continue;
        }

        let default_should_revalidate = match ctx.trigger {
            RevalidationTrigger::Submission { .. } | RevalidationTrigger::Explicit => true,
            RevalidationTrigger::Navigation | RevalidationTrigger::InitialLoad => {
                href_unchanged || search_changed || current.pathname != next.pathname
            }
        };

        let decision = match &route.handlers.should_revalidate {
            Some(policy) => policy.should_revalidate(&ShouldRevalidateArgs {
                current_url,
                next_url: ctx.next_url,
                current_params: &current.params,
                next_params: &next.params,
                form_method,
                action_status,
                action_result,
                default_should_revalidate,
            }),
            None => default_should_revalidate,
        };

        trace_log!(
            "Revalidate '{}': default={}, decision={}",
            route.id,
            default_should_revalidate,
            decision
        );
        if decision {
            selected.insert(route.id.clone());
        }
    }

    debug_log!(
        "Revalidation for '{}': [{}]",
        ctx.next_url,
        selected
            .iter()
            .map(RouteId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    selected
}
