//! Turning a pathname into the chain of routes that render it.
//!
//! The result is a [`MatchStack`]: one [`MatchEntry`] per matched route,
//! outermost first. Loaders, revalidation and error bubbling all work off
//! this chain rather than the route tree, so a path is resolved once per
//! navigation hop.
//!
//! With `/` > `nested` > {index `nested-index`, pathless `__pathless` > `foo`}
//! the pathname `/nested` yields
//!
//! ```text
//! root          /
//! nested        /nested
//! nested-index  /nested
//! ```
//!
//! and `/nested/foo` yields
//!
//! ```text
//! root          /
//! nested        /nested
//! __pathless    /nested
//! foo           /nested/foo
//! ```
//!
//! Resolution walks the [`RouteTable`]'s ranked branches and stops at the
//! first one that consumes every segment. Ranking already encodes
//! specificity, so there is no backtracking.

use crate::matching::{match_segments, split_path, Segment};
use crate::nested::normalize_path;
use crate::params::{RouteParams, SPLAT_PARAM};
use crate::route::RouteId;
use crate::table::{RouteBranch, RouteNode, RouteTable};
use crate::{debug_log, trace_log};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Match Stack
// ============================================================================

/// One matched route and what it matched.
#[derive(Debug, Clone)]
pub struct MatchEntry {
    pub route: Arc<RouteNode>,
    /// Params of this route and every ancestor.
    pub params: RouteParams,
    /// Leading part of the pathname covered up to this route.
    pub pathname: String,
    pub depth: usize,
}

impl MatchEntry {
    pub fn id(&self) -> &RouteId {
        &self.route.id
    }
}

/// Matched routes for a pathname, root first.
#[derive(Debug, Clone, Default)]
pub struct MatchStack {
    entries: Vec<MatchEntry>,
}

impl MatchStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&MatchEntry> {
        self.entries.first()
    }

    /// The route that owns the URL.
    pub fn leaf(&self) -> Option<&MatchEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MatchEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchEntry> {
        self.entries.iter()
    }

    /// Params of the leaf, which include every ancestor's.
    pub fn params(&self) -> RouteParams {
        self.leaf()
            .map(|leaf| leaf.params.clone())
            .unwrap_or_default()
    }

    pub fn find(&self, id: &str) -> Option<&MatchEntry> {
        self.iter().find(|entry| entry.route.id.as_str() == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.iter().position(|entry| entry.route.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn route_ids(&self) -> Vec<RouteId> {
        self.iter().map(|entry| entry.route.id.clone()).collect()
    }

    /// Keep the outermost `len` entries.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

/// `root > users > user(id=7)`
impl fmt::Display for MatchStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("(no match)");
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{}", entry.route.id)?;
            let own: Vec<String> = entry
                .route
                .segments
                .iter()
                .filter_map(|segment| match segment {
                    Segment::Dynamic(name) => Some(name.as_str()),
                    Segment::Splat => Some(SPLAT_PARAM),
                    Segment::Static(_) => None,
                })
                .filter_map(|key| entry.params.get(key).map(|value| format!("{key}={value}")))
                .collect();
            if !own.is_empty() {
                write!(f, "({})", own.join(", "))?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a MatchStack {
    type Item = &'a MatchEntry;
    type IntoIter = std::slice::Iter<'a, MatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the full match stack for a path.
///
/// Returns `None` when no branch matches.
///
/// ```
/// use data_router::{resolve_match_stack, Route, RouteTable, RouterConfig};
///
/// let table = RouteTable::build(
///     vec![Route::new("root", "/").child(Route::new("user", "users/:id"))],
///     &RouterConfig::default(),
/// )
/// .unwrap();
///
/// let stack = resolve_match_stack(&table, "/users/7").unwrap();
/// assert_eq!(stack.len(), 2);
/// assert_eq!(stack.params().get("id"), Some(&"7".to_string()));
/// assert!(resolve_match_stack(&table, "/nope").is_none());
/// ```
pub fn resolve_match_stack(table: &RouteTable, path: &str) -> Option<MatchStack> {
    let normalized = normalize_path(path);
    let segments = split_path(&normalized);

    for branch in table.branches() {
        trace_log!("Trying branch '{}' for '{}'", branch.pattern, normalized);
        let Some(matched) = match_segments(&branch.segments, &segments, table.case_sensitive())
        else {
            continue;
        };

        let stack = build_stack(table, branch, &segments, &matched.params, &matched.consumed)?;

        debug_log!("Resolved '{}': {}", path, stack);

        return Some(stack);
    }

    debug_log!("No route matches '{}'", path);
    None
}

/// Matches used when nothing matched: the first top-level route alone, so
/// its boundary can render the 404.
pub fn not_found_matches(table: &RouteTable) -> MatchStack {
    let entries = table
        .roots()
        .first()
        .and_then(|id| table.node(id.as_str()))
        .map(|node| MatchEntry {
            route: Arc::clone(node),
            params: RouteParams::new(),
            pathname: "/".to_string(),
            depth: 0,
        })
        .into_iter()
        .collect();
    MatchStack { entries }
}

fn build_stack(
    table: &RouteTable,
    branch: &RouteBranch,
    path: &[&str],
    params: &RouteParams,
    consumed: &[usize],
) -> Option<MatchStack> {
    let mut entries = Vec::with_capacity(branch.route_ids.len());
    let mut accumulated = RouteParams::new();
    let mut seen = 0;

    for (depth, (id, &segment_end)) in branch
        .route_ids
        .iter()
        .zip(&branch.segment_ends)
        .enumerate()
    {
        for segment in &branch.segments[seen..segment_end] {
            let key = match segment {
                Segment::Dynamic(name) => name.as_str(),
                Segment::Splat => SPLAT_PARAM,
                Segment::Static(_) => continue,
            };
            if let Some(value) = params.get(key) {
                accumulated.insert(key.to_string(), value.clone());
            }
        }
        seen = segment_end;

        let path_end = if segment_end == 0 {
            0
        } else {
            consumed[segment_end - 1]
        };

        entries.push(MatchEntry {
            route: Arc::clone(table.node(id.as_str())?),
            params: accumulated.clone(),
            pathname: format!("/{}", path[..path_end].join("/")),
            depth,
        });
    }

    Some(MatchStack { entries })
}
