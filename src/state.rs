//! What the router remembers between navigations.
//!
//! - [`RouterState`]: session history plus the navigation id counter used
//!   to detect superseded navigations.
//! - [`NavigationState`]: everything a navigation commits: location,
//!   matches, loader/action data, boundary errors, status. It is replaced
//!   wholesale, never patched.

use crate::error::RouteError;
use crate::resolve::MatchStack;
use crate::route::RouteId;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

// ============================================================================
// Location
// ============================================================================

/// Router-relative location (basename already removed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub pathname: String,
    /// Including the leading `?`, or empty.
    pub search: String,
    /// Including the leading `#`, or empty.
    pub hash: String,
}

impl Location {
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            search: String::new(),
            hash: String::new(),
        }
    }

    /// Location of `url` with `pathname` substituted (basename stripped).
    pub fn from_url(url: &Url, pathname: String) -> Self {
        Self {
            pathname,
            search: url.query().map(|q| format!("?{q}")).unwrap_or_default(),
            hash: url.fragment().map(|f| format!("#{f}")).unwrap_or_default(),
        }
    }

    /// `pathname + search + hash`.
    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("/")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

// ============================================================================
// Navigation state
// ============================================================================

/// In-flight navigation, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Navigation {
    #[default]
    Idle,
    Loading {
        location: Location,
    },
    Submitting {
        location: Location,
        method: Method,
    },
}

impl Navigation {
    pub fn is_idle(&self) -> bool {
        matches!(self, Navigation::Idle)
    }
}

/// State committed by a navigation.
#[derive(Debug, Clone)]
pub struct NavigationState {
    pub location: Location,
    pub matches: MatchStack,
    pub loader_data: BTreeMap<RouteId, Value>,
    pub action_data: Option<BTreeMap<RouteId, Value>>,
    /// Keyed by the boundary route that renders the error.
    pub errors: Option<BTreeMap<RouteId, RouteError>>,
    pub navigation: Navigation,
    pub status: StatusCode,
    /// `false` until the first navigation commits.
    pub initialized: bool,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            location: Location::default(),
            matches: MatchStack::new(),
            loader_data: BTreeMap::new(),
            action_data: None,
            errors: None,
            navigation: Navigation::Idle,
            status: StatusCode::OK,
            initialized: false,
        }
    }
}

impl NavigationState {
    pub fn loader_data(&self, id: &str) -> Option<&Value> {
        self.loader_data.get(id)
    }

    pub fn error(&self, boundary: &str) -> Option<&RouteError> {
        self.errors.as_ref()?.get(boundary)
    }

    /// Copy with a different in-flight navigation; data is untouched.
    pub fn with_navigation(&self, navigation: Navigation) -> Self {
        Self {
            navigation,
            ..self.clone()
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// How the current history entry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Push,
    Replace,
    /// Moved within existing entries (back/forward).
    Pop,
}

/// One change of the current history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryUpdate {
    pub action: HistoryAction,
    pub from: String,
    pub to: String,
    /// Entries moved; `0` for replace.
    pub delta: isize,
}

/// Session history of committed hrefs plus the navigation counter.
///
/// Clones share the counter, so a navigation started through any clone
/// supersedes the others.
#[derive(Debug, Clone)]
pub struct RouterState {
    entries: Vec<String>,
    index: usize,
    navigation_id: Arc<AtomicUsize>,
}

impl RouterState {
    /// History with a single `/` entry.
    pub fn new() -> Self {
        Self {
            entries: vec!["/".to_string()],
            index: 0,
            navigation_id: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn navigation_id(&self) -> usize {
        self.navigation_id.load(Ordering::SeqCst)
    }

    /// Claim a new navigation id; every earlier id stops being current.
    pub fn start_navigation(&self) -> usize {
        self.navigation_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_navigation_current(&self, nav_id: usize) -> bool {
        self.navigation_id() == nav_id
    }

    pub fn current_path(&self) -> &str {
        &self.entries[self.index]
    }

    /// Add an entry after the current one, dropping any forward entries.
    pub fn push(&mut self, href: String) -> HistoryUpdate {
        let from = self.current_path().to_string();
        self.entries.truncate(self.index + 1);
        self.entries.push(href.clone());
        self.index = self.entries.len() - 1;
        HistoryUpdate {
            action: HistoryAction::Push,
            from,
            to: href,
            delta: 1,
        }
    }

    pub fn replace(&mut self, href: String) -> HistoryUpdate {
        let from = std::mem::replace(&mut self.entries[self.index], href.clone());
        HistoryUpdate {
            action: HistoryAction::Replace,
            from,
            to: href,
            delta: 0,
        }
    }

    /// Move `delta` entries; `None` (and no move) when out of range.
    pub fn go(&mut self, delta: isize) -> Option<HistoryUpdate> {
        let target = self.index.checked_add_signed(delta)?;
        let to = self.entries.get(target)?.clone();
        let from = self.current_path().to_string();
        self.index = target;
        Some(HistoryUpdate {
            action: HistoryAction::Pop,
            from,
            to,
            delta,
        })
    }

    pub fn back(&mut self) -> Option<HistoryUpdate> {
        self.go(-1)
    }

    pub fn forward(&mut self) -> Option<HistoryUpdate> {
        self.go(1)
    }

    /// Href `delta` entries away, without moving.
    pub fn peek(&self, delta: isize) -> Option<&str> {
        let target = self.index.checked_add_signed(delta)?;
        self.entries.get(target).map(String::as_str)
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RouterState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_back_forward() {
        let mut history = RouterState::new();
        history.push("/users".to_string());
        history.push("/users/123".to_string());

        let back = history.back().unwrap();
        assert_eq!(back.action, HistoryAction::Pop);
        assert_eq!((back.from.as_str(), back.to.as_str()), ("/users/123", "/users"));
        assert_eq!(history.peek(1), Some("/users/123"));

        history.forward();
        assert_eq!(history.current_path(), "/users/123");
        assert!(history.forward().is_none());
        assert_eq!(history.current_path(), "/users/123");
    }

    #[test]
    fn test_push_drops_forward_entries() {
        let mut history = RouterState::new();
        history.push("/a".to_string());
        history.push("/b".to_string());
        history.go(-2).unwrap();
        history.push("/c".to_string());

        assert_eq!(history.len(), 2);
        assert!(!history.can_go_forward());
        assert_eq!(history.peek(-1), Some("/"));
    }

    #[test]
    fn test_replace_keeps_length() {
        let mut history = RouterState::new();
        history.push("/users".to_string());
        let update = history.replace("/posts".to_string());

        assert_eq!(update.from, "/users");
        assert_eq!(history.current_path(), "/posts");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_go_out_of_range() {
        let mut history = RouterState::new();
        assert!(history.go(-1).is_none());
        assert!(history.go(3).is_none());
        assert_eq!(history.peek(-1), None);
    }

    #[test]
    fn test_navigation_ids_supersede() {
        let history = RouterState::new();
        let first = history.start_navigation();
        let second = history.clone().start_navigation();
        assert!(!history.is_navigation_current(first));
        assert!(history.is_navigation_current(second));
    }

    #[test]
    fn test_location_from_url() {
        let url = Url::parse("http://localhost/app/users?page=2#top").unwrap();
        let location = Location::from_url(&url, "/users".to_string());
        assert_eq!(location.href(), "/users?page=2#top");
    }

    #[test]
    fn test_with_navigation_keeps_data() {
        let mut state = NavigationState::default();
        state
            .loader_data
            .insert(RouteId::from("root"), serde_json::json!(1));
        let loading = state.with_navigation(Navigation::Loading {
            location: Location::new("/next"),
        });
        assert_eq!(loading.loader_data("root"), Some(&serde_json::json!(1)));
        assert!(!loading.navigation.is_idle());
    }
}
