//! Values pulled out of URLs and form bodies.
//!
//! [`RouteParams`] holds what `:name` and `*` segments captured. Every
//! [`MatchEntry`](crate::MatchEntry) has its own copy, holding its segments'
//! values layered over its ancestors'.
//!
//! [`QueryParams`] keeps urlencoded pairs in order, repeats included. Form
//! submissions reuse it as [`FormData`].
//!
//! ```
//! use data_router::{QueryParams, RouteParams};
//!
//! let params: RouteParams = [("id", "42")].into_iter().collect();
//! assert_eq!(params.get_as::<u32>("id"), Some(42));
//!
//! let query = QueryParams::from_query_string("_routes=root,routes%2Fnested&index");
//! assert_eq!(query.get("_routes"), Some(&"root,routes/nested".to_string()));
//! assert!(query.contains("index"));
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Key a trailing `*` segment stores its remainder under.
pub const SPLAT_PARAM: &str = "*";

/// Captured path params, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteParams {
    values: BTreeMap<String, String>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(key)
    }

    /// `None` when the key is absent or its value does not parse.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.values.get(key).and_then(|raw| raw.parse().ok())
    }

    pub fn splat(&self) -> Option<&str> {
        self.values.get(SPLAT_PARAM).map(String::as_str)
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `outer` overlaid with `inner`; on a shared key `inner` wins.
    ///
    /// ```
    /// use data_router::RouteParams;
    ///
    /// let org: RouteParams = [("org", "acme"), ("view", "list")].into_iter().collect();
    /// let project: RouteParams = [("project", "7"), ("view", "grid")].into_iter().collect();
    ///
    /// let merged = RouteParams::merge(&org, &project);
    /// assert_eq!(merged.len(), 3);
    /// assert_eq!(merged.get("view").map(String::as_str), Some("grid"));
    /// ```
    pub fn merge(outer: &RouteParams, inner: &RouteParams) -> RouteParams {
        let mut values = outer.values.clone();
        values.extend(inner.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        RouteParams { values }
    }

    /// True when `other` holds every pair of `self`.
    pub fn is_subset_of(&self, other: &RouteParams) -> bool {
        self.values
            .iter()
            .all(|(key, value)| other.values.get(key) == Some(value))
    }
}

impl<K, V> FromIterator<(K, V)> for RouteParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Submitted form fields share the query-string representation.
pub type FormData = QueryParams;

/// Ordered, multi-valued `x-www-form-urlencoded` pairs.
///
/// Keys without `=` (such as the bare `index` flag) are kept with an empty
/// value.
///
/// ```
/// use data_router::QueryParams;
///
/// let query = QueryParams::from_query_string("tag=a&tag=b&page=2");
/// assert_eq!(query.get_all("tag").len(), 2);
/// assert_eq!(query.get_as::<u32>("page"), Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an urlencoded string (without the leading `?`).
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value under `key`.
    pub fn get(&self, key: &str) -> Option<&String> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    /// All values under `key`, in input order.
    pub fn get_all(&self, key: &str) -> Vec<&String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, value)| value)
            .collect()
    }

    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.get(key)?.parse().ok()
    }

    /// Append a value; existing values for the key are kept.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Remove every value for a key, returning them.
    pub fn remove(&mut self, key: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.pairs.retain(|(k, value)| {
            if k == key {
                removed.push(value.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize back into an urlencoded string (no leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of pairs (a repeated key counts once per value).
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
