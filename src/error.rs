//! Failure and outcome types.
//!
//! - [`NavigationResult`]: the top-level outcome of a client navigation
//!   (`Success`, `NotFound`, `External`, `Aborted`, `Error`).
//! - [`RouterError`]: operational failures (no match, aborted request,
//!   redirect loop, unknown route id, ...).
//! - [`BuildError`]: fatal route-table validation errors, each naming the
//!   offending route, plus a rejected [`RouterConfig`](crate::RouterConfig).
//! - [`RouteCollision`]: a non-fatal diagnostic produced while ranking.
//! - [`RouteError`] / [`ErrorResponse`]: what a failing loader or action
//!   leaves for the nearest error boundary.
//!
//! # Examples
//!
//! ```
//! use data_router::error::{ErrorResponse, NavigationResult, RouteError};
//!
//! let result = NavigationResult::External { location: "https://example.com/".into() };
//! assert_eq!(result.external_location(), Some("https://example.com/"));
//!
//! let error = RouteError::from(ErrorResponse::new(404, serde_json::json!("gone")));
//! assert_eq!(error.status(), 404);
//! assert!(error.is_route_error_response());
//! ```

use crate::config::ValidationError;
use crate::route::RouteId;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Navigation outcomes
// ============================================================================

/// Outcome of a navigation through [`DataRouter`](crate::router::DataRouter).
#[derive(Debug, Clone)]
pub enum NavigationResult {
    /// Navigation committed
    Success { path: String },
    /// No route matched; the root boundary holds a 404
    NotFound { path: String },
    /// A loader or action redirected to another origin
    External { location: String },
    /// Superseded by a newer navigation before it could commit
    Aborted,
    /// Pipeline failure with no boundary to absorb it.
    Error(RouterError),
}

impl NavigationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, NavigationResult::Success { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NavigationResult::NotFound { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, NavigationResult::Aborted)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NavigationResult::Error(_))
    }

    /// Location of an external redirect, if any.
    pub fn external_location(&self) -> Option<&str> {
        match self {
            NavigationResult::External { location } => Some(location),
            _ => None,
        }
    }
}

// ============================================================================
// Router Errors
// ============================================================================

/// Operational errors returned by the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("no route matches '{path}'")]
    RouteNotFound { path: String },

    #[error("route '{route_id}' does not handle {method} requests")]
    MethodNotAllowed { method: String, route_id: RouteId },

    #[error("unknown route id '{route_id}'")]
    UnknownRoute { route_id: RouteId },

    #[error("loader for route '{route_id}' failed: {message}")]
    LoaderError { route_id: RouteId, message: String },

    #[error("action for route '{route_id}' failed: {message}")]
    ActionError { route_id: RouteId, message: String },

    #[error("request aborted")]
    Aborted,

    #[error("more than {max} redirects, last location '{location}'")]
    TooManyRedirects { max: usize, location: String },

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Fatal route-table validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("duplicate route id '{id}'")]
    DuplicateRouteId { id: RouteId },

    #[error("index route '{id}' cannot have children")]
    IndexWithChildren { id: RouteId },

    #[error("route '{id}' has invalid path '{path}': {reason}")]
    InvalidPath {
        id: RouteId,
        path: String,
        reason: String,
    },

    #[error("routes '{first}' and '{second}' both match '{pattern}' with equal specificity")]
    AmbiguousRoutes {
        pattern: String,
        first: RouteId,
        second: RouteId,
    },

    #[error("route '{id}' is nested deeper than {max_depth} levels")]
    MaxDepthExceeded { id: RouteId, max_depth: usize },

    #[error("invalid router config: {}", join_validation(.0))]
    InvalidConfig(Vec<ValidationError>),
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl BuildError {
    /// The route the diagnostic points at, if any.
    pub fn route_id(&self) -> Option<&RouteId> {
        match self {
            BuildError::DuplicateRouteId { id }
            | BuildError::IndexWithChildren { id }
            | BuildError::InvalidPath { id, .. }
            | BuildError::MaxDepthExceeded { id, .. } => Some(id),
            BuildError::AmbiguousRoutes { second, .. } => Some(second),
            BuildError::InvalidConfig(_) => None,
        }
    }
}

/// Two branches share a URL shape but not a score. The winner always
/// matches first; the loser is unreachable for that shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCollision {
    pub pattern: String,
    pub winner: RouteId,
    pub loser: RouteId,
}

impl fmt::Display for RouteCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "route '{}' shadows '{}' on '{}'",
            self.winner, self.loser, self.pattern
        )
    }
}

// ============================================================================
// Route Errors (boundary payloads)
// ============================================================================

/// A thrown or generated error response with a status code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: u16,
    pub status_text: String,
    pub data: Value,
    /// Generated by the router itself rather than thrown by user code.
    pub internal: bool,
}

impl ErrorResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self {
            status,
            status_text: canonical_reason(status),
            data,
            internal: false,
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self {
            internal: true,
            ..Self::new(404, Value::String(format!("No route matches URL \"{path}\"")))
        }
    }

    pub fn method_not_allowed(method: &str, route_id: &RouteId) -> Self {
        Self {
            internal: true,
            ..Self::new(
                405,
                Value::String(format!(
                    "You made a {method} request to \"{route_id}\" but did not provide an action"
                )),
            )
        }
    }

    /// A fetcher load addressed a route without a loader.
    pub fn no_loader(route_id: &RouteId) -> Self {
        Self {
            internal: true,
            ..Self::new(
                400,
                Value::String(format!("Route \"{route_id}\" does not have a loader")),
            )
        }
    }
}

fn canonical_reason(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

/// Error value held by a boundary in [`NavigationState::errors`](crate::state::NavigationState).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "__type")]
pub enum RouteError {
    /// A thrown response (or router-generated 404/405).
    #[serde(rename = "RouteErrorResponse")]
    Response(ErrorResponse),
    /// Any other failure; becomes a 500.
    #[serde(rename = "Error")]
    Thrown { message: String },
}

impl RouteError {
    pub fn thrown(message: impl Into<String>) -> Self {
        RouteError::Thrown {
            message: message.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RouteError::Response(response) => response.status,
            RouteError::Thrown { .. } => 500,
        }
    }

    pub fn is_route_error_response(&self) -> bool {
        matches!(self, RouteError::Response(_))
    }

    pub fn message(&self) -> String {
        match self {
            RouteError::Response(response) => match &response.data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            RouteError::Thrown { message } => message.clone(),
        }
    }
}

impl From<ErrorResponse> for RouteError {
    fn from(response: ErrorResponse) -> Self {
        RouteError::Response(response)
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Response(response) => {
                write!(f, "{} {}", response.status, response.status_text)
            }
            RouteError::Thrown { message } => f.write_str(message),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_predicates_are_exclusive() {
        let outcomes = [
            NavigationResult::Success { path: "/a".into() },
            NavigationResult::NotFound { path: "/b".into() },
            NavigationResult::Aborted,
            NavigationResult::Error(RouterError::Aborted),
        ];
        for outcome in &outcomes {
            let flags = [
                outcome.is_success(),
                outcome.is_not_found(),
                outcome.is_aborted(),
                outcome.is_error(),
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{outcome:?}");
            assert_eq!(outcome.external_location(), None);
        }
    }

    #[test]
    fn test_navigation_result_external() {
        let result = NavigationResult::External {
            location: "https://example.com/".to_string(),
        };
        assert_eq!(result.external_location(), Some("https://example.com/"));
    }

    #[test]
    fn test_router_error_display() {
        let error = RouterError::RouteNotFound {
            path: "/test".to_string(),
        };
        assert_eq!(error.to_string(), "no route matches '/test'");

        let error = RouterError::from(BuildError::IndexWithChildren {
            id: RouteId::from("home"),
        });
        assert_eq!(error.to_string(), "index route 'home' cannot have children");
    }

    #[test]
    fn test_method_not_allowed_is_internal() {
        let response = ErrorResponse::method_not_allowed("POST", &RouteId::from("root"));
        assert_eq!(response.status, 405);
        assert_eq!(response.status_text, "Method Not Allowed");
        assert!(response.internal);
    }

    #[test]
    fn test_thrown_error_defaults_to_500() {
        let error = RouteError::thrown("boom");
        assert_eq!(error.status(), 500);
        assert!(!error.is_route_error_response());
        assert_eq!(error.message(), "boom");
    }

    #[test]
    fn test_route_error_serialization_is_tagged() {
        let error = RouteError::from(ErrorResponse::new(401, json!({"reason": "login"})));
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["__type"], "RouteErrorResponse");
        assert_eq!(value["status"], 401);
        assert_eq!(value["statusText"], "Unauthorized");

        let value = serde_json::to_value(RouteError::thrown("boom")).unwrap();
        assert_eq!(value, json!({"__type": "Error", "message": "boom"}));
    }
}
