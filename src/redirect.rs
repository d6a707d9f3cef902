//! Redirect chains.
//!
//! [`follow_redirects`] runs hop after hop until a hop produces no redirect.
//! Cookies set by one hop are sent to the next through a [`CookieJar`]. The
//! load filter is decided again on every hop against that hop's URL, so the
//! hop that settles the chain loads what its own URL calls for.

use crate::error::RouterError;
use crate::loader::DataRequest;
use crate::nested::strip_basename;
use crate::pipeline::{
    action_target, find_nearest_boundary, load_route_data, process_results, routes_through,
    submit, DataContext, LoadFilter, RouteResult,
};
use crate::registry::RouteRegistry;
use crate::resolve::MatchStack;
use crate::route::RouteId;
use crate::{debug_log, info_log, trace_log, warn_log};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::collections::BTreeMap;
use url::Url;

// ============================================================================
// Cookie jar
// ============================================================================

/// Cookies carried from hop to hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the `Cookie` headers of a request.
    pub fn from_request(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for header in headers.get_all(COOKIE).iter().filter_map(|v| v.to_str().ok()) {
            for pair in header.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    jar.cookies.insert(name.to_string(), value.to_string());
                }
            }
        }
        jar
    }

    /// Apply one `Set-Cookie` value. `Max-Age=0` (or negative) deletes.
    pub fn apply_set_cookie(&mut self, set_cookie: &str) {
        let mut parts = set_cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|p| p.trim().split_once('=')) else {
            warn_log!("Ignoring malformed Set-Cookie '{}'", set_cookie);
            return;
        };
        let expired = parts.any(|attr| {
            attr.trim()
                .split_once('=')
                .filter(|(key, _)| key.eq_ignore_ascii_case("max-age"))
                .and_then(|(_, age)| age.trim().parse::<i64>().ok())
                .is_some_and(|age| age <= 0)
        });
        if expired {
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), value.to_string());
        }
    }

    /// Apply every `Set-Cookie` in `headers`.
    pub fn apply(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()) {
            self.apply_set_cookie(value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// `Cookie` header value, or `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Replace the `Cookie` headers of `request` with the jar's contents.
    fn attach(&self, request: &mut DataRequest) {
        request.headers.remove(COOKIE);
        if let Some(value) = self.header_value() {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    request.headers.insert(COOKIE, value);
                }
                Err(_) => {
                    warn_log!("Cookie jar produced an invalid header value");
                }
            }
        }
    }
}

// ============================================================================
// Locations
// ============================================================================

/// Where a redirect points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Same origin; followed by the chain.
    Internal(Url),
    /// Another origin; handed back to the caller untouched.
    External(String),
}

/// Resolve `location` against `current` and compare origins.
pub fn classify_location(current: &Url, location: &str) -> Result<RedirectTarget, RouterError> {
    let next = current.join(location).map_err(|e| RouterError::InvalidUrl {
        url: location.to_string(),
        reason: e.to_string(),
    })?;
    if next.origin() == current.origin() {
        Ok(RedirectTarget::Internal(next))
    } else {
        Ok(RedirectTarget::External(location.to_string()))
    }
}

/// Method and body of the request that follows a redirect with `status`.
///
/// 307 and 308 replay the request; every other redirect becomes a GET.
pub fn redirected_request(previous: &DataRequest, url: Url, status: StatusCode) -> DataRequest {
    let replay = matches!(
        status,
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
    );
    let mut next = DataRequest::new(
        if replay {
            previous.method.clone()
        } else {
            Method::GET
        },
        url,
    )
    .with_headers(previous.headers.clone())
    .with_signal(previous.signal.clone());
    if replay {
        next.form = previous.form.clone();
    }
    next
}

// ============================================================================
// Chain
// ============================================================================

/// End of a redirect chain.
#[derive(Debug, Clone)]
pub enum ChainOutcome {
    /// The last hop did not redirect.
    Complete {
        context: DataContext,
        /// Request of the final hop.
        request: DataRequest,
        /// Hops run, including the first.
        hops: usize,
        /// Every `Set-Cookie` value of the chain, in order.
        set_cookies: Vec<HeaderValue>,
        jar: CookieJar,
    },
    /// A hop redirected to another origin.
    External {
        location: String,
        status: StatusCode,
        headers: HeaderMap,
        set_cookies: Vec<HeaderValue>,
    },
}

impl ChainOutcome {
    pub fn is_external(&self) -> bool {
        matches!(self, ChainOutcome::External { .. })
    }

    pub fn context(&self) -> Option<&DataContext> {
        match self {
            ChainOutcome::Complete { context, .. } => Some(context),
            ChainOutcome::External { .. } => None,
        }
    }
}

/// Route-relative pathname of `url`, or `RouteNotFound` outside the basename.
pub(crate) fn router_path(url: &Url, basename: &str) -> Result<String, RouterError> {
    strip_basename(url.path(), basename).ok_or_else(|| RouterError::RouteNotFound {
        path: url.path().to_string(),
    })
}

/// True when the query carries the `index` flag.
pub(crate) fn has_index_flag(url: &Url) -> bool {
    url.query_pairs().any(|(key, _)| key == "index")
}

/// Run `request` and every redirect it leads to.
///
/// `decide` picks the loaders of each hop. It sees the hop's request and
/// matches, plus the most recent action result of the chain, so hops that
/// follow a submission are still decided as part of that submission. A hop
/// whose path matches nothing ends the chain with
/// [`RouterError::RouteNotFound`].
pub async fn follow_redirects<F>(
    registry: &RouteRegistry,
    request: DataRequest,
    decide: F,
) -> Result<ChainOutcome, RouterError>
where
    F: FnMut(&DataRequest, &MatchStack, Option<&(RouteId, RouteResult)>) -> LoadFilter,
{
    let table = registry.snapshot();
    let config = registry.config();
    let mut jar = CookieJar::from_request(&request.headers);
    let mut request = request;
    let mut decide = decide;
    let mut last_action: Option<(RouteId, RouteResult)> = None;
    let mut set_cookies = Vec::new();
    let mut hops = 0usize;

    loop {
        if request.signal.is_aborted() {
            return Err(RouterError::Aborted);
        }
        hops += 1;
        jar.attach(&mut request);

        let path = router_path(&request.url, &config.basename)?;
        let matches = registry
            .resolve_in(&table, &path)
            .ok_or_else(|| RouterError::RouteNotFound { path: path.clone() })?;
        trace_log!("Hop {} {} '{}'", hops, request.method, path);

        let action = if request.is_mutation() {
            let target = action_target(&matches, has_index_flag(&request.url)).ok_or_else(|| {
                RouterError::RouteNotFound { path: path.clone() }
            })?;
            let result = submit(&matches, &target, &request).await?;
            jar.apply(result.1.headers());
            jar.attach(&mut request);
            last_action = Some(result.clone());
            Some(result)
        } else {
            None
        };

        let mut filter = decide(&request, &matches, last_action.as_ref());
        if let Some((id, RouteResult::Error { .. })) = &action {
            if let Some(boundary) = find_nearest_boundary(&matches, id.as_str()) {
                filter = filter.restrict(&routes_through(&matches, boundary.as_str()));
            }
        }

        let loaders = load_route_data(&matches, &request, &filter).await?;
        let context = process_results(&matches, action, loaders);
        jar.apply(&context.headers);
        set_cookies.extend(context.headers.get_all(SET_COOKIE).iter().cloned());

        let Some(redirect) = context.redirect.clone() else {
            debug_log!("Chain for '{}' settled after {} hops", path, hops);
            return Ok(ChainOutcome::Complete {
                context,
                request,
                hops,
                set_cookies,
                jar,
            });
        };

        let location = redirect.location().unwrap_or("/").to_string();
        if hops > config.max_redirects {
            warn_log!("Redirect limit {} hit at '{}'", config.max_redirects, location);
            return Err(RouterError::TooManyRedirects {
                max: config.max_redirects,
                location,
            });
        }

        match classify_location(&request.url, &location)? {
            RedirectTarget::External(location) => {
                info_log!("External redirect from '{}' to '{}'", path, location);
                return Ok(ChainOutcome::External {
                    location,
                    status: redirect.status,
                    headers: context.headers,
                    set_cookies,
                });
            }
            RedirectTarget::Internal(url) => {
                debug_log!("Redirect {} '{}' → '{}'", redirect.status, path, url);
                request = redirected_request(&request, url, redirect.status);
            }
        }
    }
}
