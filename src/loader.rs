//! Loader and action contracts.
//!
//! A [`Loader`] produces read data for a matched route; an [`Action`] handles
//! a mutation. Both receive a [`DataFunctionArgs`] (a clone of the shared
//! [`DataRequest`] plus the route's accumulated params) and resolve to a
//! [`DataResult`]:
//!
//! - `Ok(response)`: data, or a redirect when the status is 3xx with a
//!   `Location` header.
//! - `Err(RouteThrow::Response(..))`: a thrown response. Redirect statuses
//!   still redirect; anything else becomes an error response for the nearest
//!   error boundary.
//! - `Err(RouteThrow::Error(..))`: any other failure (status 500).
//!
//! # Creating loaders
//!
//! | Approach | When to use |
//! |----------|-------------|
//! | Implement [`Loader`] / [`Action`] | Stateful handlers |
//! | [`loader_fn`] / [`action_fn`] | An async closure |
//!
//! ```
//! use data_router::loader::{loader_fn, RouteResponse};
//! use serde_json::json;
//!
//! let loader = loader_fn(|args| async move {
//!     let id = args.params.get("id").cloned().unwrap_or_default();
//!     Ok(RouteResponse::data(json!({ "id": id })))
//! });
//! # let _ = loader;
//! ```

use crate::abort::AbortSignal;
use crate::error::RouterError;
use crate::params::{FormData, QueryParams, RouteParams};
use crate::warn_log;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::header::{IntoHeaderName, COOKIE, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use url::Url;

// ============================================================================
// Request
// ============================================================================

/// The request every loader and action of one hop receives a clone of.
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Submitted form body for mutations.
    pub form: Option<FormData>,
    pub signal: AbortSignal,
}

impl DataRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            form: None,
            signal: AbortSignal::never(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Resolve `href` against `origin` and build a request.
    pub fn parse(method: Method, href: &str, origin: &Url) -> Result<Self, RouterError> {
        let url = origin.join(href).map_err(|e| RouterError::InvalidUrl {
            url: href.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(method, url))
    }

    pub fn with_form(mut self, form: FormData) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Append a header. Values that are not valid header text are dropped.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => {
                warn_log!("Dropping invalid request header value '{}'", value);
            }
        }
        self
    }

    pub fn pathname(&self) -> &str {
        self.url.path()
    }

    pub fn search_params(&self) -> QueryParams {
        QueryParams::from_query_string(self.url.query().unwrap_or_default())
    }

    /// Anything other than GET and HEAD.
    pub fn is_mutation(&self) -> bool {
        self.method != Method::GET && self.method != Method::HEAD
    }

    /// Value of a cookie sent with the request.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

/// Arguments passed to a loader or action.
#[derive(Debug, Clone)]
pub struct DataFunctionArgs {
    pub request: DataRequest,
    /// Accumulated params of the route and its ancestors.
    pub params: RouteParams,
}

pub type LoaderArgs = DataFunctionArgs;
pub type ActionArgs = DataFunctionArgs;

// ============================================================================
// Response
// ============================================================================

/// What a loader or action returns (or throws).
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub data: Value,
}

impl RouteResponse {
    /// `200` with a JSON body.
    pub fn data(data: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            data,
        }
    }

    /// `200` with a `null` body.
    pub fn empty() -> Self {
        Self::data(Value::Null)
    }

    /// `302 Found` to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::redirect_with(location, StatusCode::FOUND)
    }

    pub fn redirect_with(location: &str, status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            data: Value::Null,
        }
        .with_header(LOCATION, location)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Append a header; repeated names are kept, never overwritten.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => {
                warn_log!("Dropping invalid response header value '{}'", value);
            }
        }
        self
    }

    pub fn set_cookie(self, cookie: &str) -> Self {
        self.with_header(SET_COOKIE, cookie)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION)?.to_str().ok()
    }

    /// A 3xx status carrying a `Location` header.
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection() && self.location().is_some()
    }
}

/// Failure raised by a loader or action.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteThrow {
    Response(RouteResponse),
    Error(String),
}

impl RouteThrow {
    pub fn error(message: impl fmt::Display) -> Self {
        RouteThrow::Error(message.to_string())
    }
}

impl From<RouteResponse> for RouteThrow {
    fn from(response: RouteResponse) -> Self {
        RouteThrow::Response(response)
    }
}

pub type DataResult = Result<RouteResponse, RouteThrow>;

// ============================================================================
// Loader / Action traits
// ============================================================================

/// Produces read data for a matched route.
pub trait Loader: Send + Sync + 'static {
    fn load(&self, args: LoaderArgs) -> BoxFuture<'static, DataResult>;
}

/// Handles a mutation for a matched route.
pub trait Action: Send + Sync + 'static {
    fn run(&self, args: ActionArgs) -> BoxFuture<'static, DataResult>;
}

/// Create a loader from an async closure.
pub const fn loader_fn<F, Fut>(f: F) -> FnLoader<F>
where
    F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DataResult> + Send + 'static,
{
    FnLoader { f }
}

/// Loader created from a closure via [`loader_fn`].
pub struct FnLoader<F> {
    f: F,
}

impl<F, Fut> Loader for FnLoader<F>
where
    F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DataResult> + Send + 'static,
{
    fn load(&self, args: LoaderArgs) -> BoxFuture<'static, DataResult> {
        (self.f)(args).boxed()
    }
}

/// Create an action from an async closure.
pub const fn action_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn(ActionArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DataResult> + Send + 'static,
{
    FnAction { f }
}

/// Action created from a closure via [`action_fn`].
pub struct FnAction<F> {
    f: F,
}

impl<F, Fut> Action for FnAction<F>
where
    F: Fn(ActionArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DataResult> + Send + 'static,
{
    fn run(&self, args: ActionArgs) -> BoxFuture<'static, DataResult> {
        (self.f)(args).boxed()
    }
}
