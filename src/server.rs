//! HTTP surface.
//!
//! [`RequestHandler`] answers three kinds of requests:
//!
//! - **Data** (`/path.data`, `/_root.data` for `/`): a JSON envelope keyed
//!   by route id, `{"data": …}` or `{"error": …}` per route. `_routes=a,b`
//!   restricts which loaders run. Redirects become `202` with
//!   `{"redirect": location, "status": code}` so the client can follow them.
//! - **Resource** (leaf marked `resource`): the loader or action body as
//!   JSON, with its own status and headers.
//! - **Document**: an HTML shell embedding the serialized router context.
//!
//! HEAD is answered like GET with the body dropped.

use crate::error::{ErrorResponse, RouteError, RouterError};
use crate::loader::DataRequest;
use crate::nested::{strip_basename, with_basename};
use crate::params::FormData;
use crate::pipeline::{
    action_target, load_route_data, process_results, run_hop, submit, DataContext, LoadFilter,
    RouteResult,
};
use crate::redirect::has_index_flag;
use crate::registry::RouteRegistry;
use crate::resolve::{not_found_matches, MatchStack};
use crate::route::RouteId;
use crate::{debug_log, info_log, warn_log};
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use url::Url;

/// Route path standing in for `/` in data URLs.
const ROOT_DATA_PATH: &str = "/_root";
/// Query key restricting the loaders of a data request.
const ROUTES_PARAM: &str = "_routes";

const JSON_CONTENT_TYPE: &str = "application/json";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// What a request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestKind {
    Data { only: Option<BTreeSet<RouteId>> },
    Document,
}

#[derive(Debug, Clone)]
pub struct RequestHandler {
    registry: Arc<RouteRegistry>,
    origin: Url,
}

impl RequestHandler {
    pub fn new(registry: Arc<RouteRegistry>) -> Result<Self, RouterError> {
        let origin = registry.config().origin_url()?;
        Ok(Self { registry, origin })
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Answer one request. Never fails: every problem becomes a response.
    pub async fn handle(&self, request: Request<String>) -> Response<String> {
        let head = request.method() == Method::HEAD;
        let mut response = self.dispatch(request).await;
        if head {
            response.body_mut().clear();
        }
        response
    }

    async fn dispatch(&self, request: Request<String>) -> Response<String> {
        let config = self.registry.config();
        let target = request
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let mut url = match self.origin.join(target) {
            Ok(url) => url,
            Err(e) => {
                warn_log!("Rejecting request for '{}': {}", target, e);
                return text_response(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };
        debug_log!("{} {}", request.method(), url.path());

        let Some(path) = strip_basename(url.path(), &config.basename) else {
            return text_response(StatusCode::NOT_FOUND, "Not Found");
        };

        let data_path = path
            .strip_suffix(config.data_suffix.as_str())
            .filter(|_| !config.data_suffix.is_empty())
            .map(str::to_string);
        let (path, kind) = match data_path {
            Some(route_path) => {
                let route_path = if route_path == ROOT_DATA_PATH || route_path.is_empty() {
                    "/".to_string()
                } else {
                    route_path
                };
                let only = take_routes_param(&mut url);
                url.set_path(&with_basename(&route_path, &config.basename));
                (route_path, RequestKind::Data { only })
            }
            _ => (path, RequestKind::Document),
        };

        let method = if request.method() == Method::HEAD {
            Method::GET
        } else {
            request.method().clone()
        };
        let (parts, body) = request.into_parts();
        let mut data_request = DataRequest::new(method, url).with_headers(parts.headers);
        if data_request.is_mutation() {
            data_request.form = Some(FormData::from_query_string(&body));
        }

        let Some(matches) = self.registry.resolve(&path) else {
            return self.not_found(&path, &kind);
        };

        match kind {
            RequestKind::Data { .. } if data_request.is_mutation() => {
                self.data_action(&matches, &data_request).await
            }
            RequestKind::Data { only } => self.data_loaders(&matches, &data_request, only).await,
            RequestKind::Document if matches.leaf().is_some_and(|l| l.route.is_resource()) => {
                self.resource(&matches, &data_request).await
            }
            RequestKind::Document => self.document(&matches, &data_request).await,
        }
    }

    fn not_found(&self, path: &str, kind: &RequestKind) -> Response<String> {
        info_log!("No route matches '{}'", path);
        let matches = not_found_matches(&self.registry.snapshot());
        let error = RouteError::from(ErrorResponse::not_found(path));
        let Some(root) = matches.root() else {
            return text_response(StatusCode::NOT_FOUND, "Not Found");
        };
        match kind {
            RequestKind::Data { .. } => {
                let mut envelope = Map::new();
                envelope.insert(root.route.id.to_string(), json!({ "error": error }));
                json_response(StatusCode::NOT_FOUND, HeaderMap::new(), &Value::Object(envelope))
            }
            RequestKind::Document => {
                let context = json!({
                    "url": path,
                    "matches": matches_json(&matches),
                    "loaderData": {},
                    "actionData": null,
                    "errors": { root.route.id.as_str(): error },
                });
                html_response(StatusCode::NOT_FOUND, HeaderMap::new(), &context)
            }
        }
    }

    // ========================================================================
    // Data requests
    // ========================================================================

    async fn data_loaders(
        &self,
        matches: &MatchStack,
        request: &DataRequest,
        only: Option<BTreeSet<RouteId>>,
    ) -> Response<String> {
        let filter = LoadFilter {
            only,
            skip: BTreeSet::new(),
        };
        let results = match load_route_data(matches, request, &filter).await {
            Ok(results) => results,
            Err(e) => return router_error_response(&e),
        };

        let mut envelope = Map::new();
        for (id, result) in &results {
            if let Some(entry) = envelope_entry(result) {
                envelope.insert(id.to_string(), entry);
            }
        }
        let context = process_results(matches, None, results);
        if let Some(response) = redirect_envelope(&context) {
            return response;
        }
        json_response(context.status, context.headers, &Value::Object(envelope))
    }

    async fn data_action(&self, matches: &MatchStack, request: &DataRequest) -> Response<String> {
        let Some(target) = action_target(matches, has_index_flag(&request.url)) else {
            return text_response(StatusCode::NOT_FOUND, "Not Found");
        };
        let action = match submit(matches, &target, request).await {
            Ok(action) => action,
            Err(e) => return router_error_response(&e),
        };

        let mut envelope = Map::new();
        if let Some(entry) = envelope_entry(&action.1) {
            envelope.insert(action.0.to_string(), entry);
        }
        let context = process_results(matches, Some(action), Vec::new());
        if let Some(response) = redirect_envelope(&context) {
            return response;
        }
        json_response(context.status, context.headers, &Value::Object(envelope))
    }

    // ========================================================================
    // Resource routes
    // ========================================================================

    async fn resource(&self, matches: &MatchStack, request: &DataRequest) -> Response<String> {
        let Some(leaf) = matches.leaf() else {
            return text_response(StatusCode::NOT_FOUND, "Not Found");
        };
        let id = leaf.route.id.clone();

        let result = if request.is_mutation() {
            match submit(matches, &id, request).await {
                Ok((_, result)) => result,
                Err(e) => return router_error_response(&e),
            }
        } else if leaf.route.has_loader() {
            let filter = LoadFilter::only([id.clone()]);
            match load_route_data(matches, request, &filter).await {
                Ok(mut results) => match results.pop() {
                    Some((_, result)) => result,
                    None => RouteResult::error(ErrorResponse::no_loader(&id)),
                },
                Err(e) => return router_error_response(&e),
            }
        } else {
            RouteResult::error(ErrorResponse::no_loader(&id))
        };

        match result {
            RouteResult::Data(response) | RouteResult::Redirect(response) => {
                let mut out = json_response(response.status, response.headers, &response.data);
                if out.status().is_redirection() {
                    out.body_mut().clear();
                }
                out
            }
            RouteResult::Error { error, headers } => {
                let status = StatusCode::from_u16(error.status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                json_response(status, headers, &serde_json::to_value(&error).unwrap_or_default())
            }
        }
    }

    // ========================================================================
    // Documents
    // ========================================================================

    async fn document(&self, matches: &MatchStack, request: &DataRequest) -> Response<String> {
        let target = if request.is_mutation() {
            action_target(matches, has_index_flag(&request.url))
        } else {
            None
        };
        let context = match run_hop(matches, request, target.as_ref(), |_| LoadFilter::all()).await
        {
            Ok(context) => context,
            Err(e) => return router_error_response(&e),
        };

        if let Some(redirect) = &context.redirect {
            let mut response = Response::new(String::new());
            *response.status_mut() = redirect.status;
            let headers = response.headers_mut();
            headers.extend(context.headers.clone());
            if let Some(location) = redirect.headers.get(LOCATION) {
                headers.insert(LOCATION, location.clone());
            }
            return response;
        }

        let href = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };
        let payload = json!({
            "url": href,
            "matches": matches_json(matches),
            "loaderData": context.loader_data,
            "actionData": context.action_data,
            "errors": context.errors,
        });
        html_response(context.status, context.headers, &payload)
    }
}

// ============================================================================
// Response helpers
// ============================================================================

/// Remove `_routes` from the query, returning the ids it named.
fn take_routes_param(url: &mut Url) -> Option<BTreeSet<RouteId>> {
    let mut only: Option<BTreeSet<RouteId>> = None;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(key, value)| {
            if key == ROUTES_PARAM {
                only.get_or_insert_with(BTreeSet::new).extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(RouteId::from),
                );
                None
            } else {
                Some((key.into_owned(), value.into_owned()))
            }
        })
        .collect();
    if only.is_some() {
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    only
}

fn envelope_entry(result: &RouteResult) -> Option<Value> {
    match result {
        RouteResult::Data(response) => Some(json!({ "data": response.data })),
        RouteResult::Error { error, .. } => Some(json!({ "error": error })),
        RouteResult::Redirect(_) => None,
    }
}

fn redirect_envelope(context: &DataContext) -> Option<Response<String>> {
    let redirect = context.redirect.as_ref()?;
    let body = json!({
        "redirect": redirect.location().unwrap_or("/"),
        "status": redirect.status.as_u16(),
    });
    Some(json_response(
        StatusCode::ACCEPTED,
        context.headers.clone(),
        &body,
    ))
}

fn matches_json(matches: &MatchStack) -> Value {
    matches
        .iter()
        .map(|entry| {
            let params: Map<String, Value> = entry
                .params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            json!({
                "id": entry.route.id,
                "pathname": entry.pathname,
                "params": params,
            })
        })
        .collect()
}

fn json_response(status: StatusCode, headers: HeaderMap, body: &Value) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

fn html_response(status: StatusCode, headers: HeaderMap, context: &Value) -> Response<String> {
    let script = context.to_string().replace('<', "\\u003c");
    let body = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n\
         <div id=\"root\"></div>\n<script>window.__routerContext = {script};</script>\n\
         </body>\n</html>\n"
    );
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    response
}

fn text_response(status: StatusCode, body: &str) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
}

fn router_error_response(error: &RouterError) -> Response<String> {
    let status = match error {
        RouterError::RouteNotFound { .. } | RouterError::UnknownRoute { .. } => {
            StatusCode::NOT_FOUND
        }
        RouterError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        RouterError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn_log!("Request failed with {}: {}", status, error);
    text_response(status, &error.to_string())
}
