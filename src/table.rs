//! Compiled route table.
//!
//! [`RouteTable::build`] walks the [`Route`] tree once, validates it and
//! flattens it into ranked [`RouteBranch`]es. Every path route and every index
//! route yields one branch (its ancestor chain plus itself); pathless layouts
//! only appear inside their descendants' branches.
//!
//! ```text
//! root "/"                      branch "/"           [root]
//!   nested "nested"             branch "/nested"     [root, nested]
//!     (index) nested-index      branch "/nested"     [root, nested, nested-index]   (+2)
//!     (layout) __pathless
//!       foo "foo"               branch "/nested/foo" [root, nested, __pathless, foo]
//! ```
//!
//! Branches are sorted by score (descending), ties by definition order with
//! descendants ahead of their ancestors. The table is immutable; a rebuild
//! produces a new one (see [`RouteRegistry`](crate::registry::RouteRegistry)).

use crate::config::RouterConfig;
use crate::error::{BuildError, RouteCollision};
use crate::matching::{compute_score, parse_pattern, pattern_shape, pattern_string, Segment};
use crate::nested::{extends_path, normalize_path};
use crate::route::{Route, RouteHandlers, RouteId, RouteKind};
use crate::{debug_log, warn_log};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A validated route.
#[derive(Debug)]
pub struct RouteNode {
    pub id: RouteId,
    pub kind: RouteKind,
    /// Segments this node adds to the URL (empty for index and pathless).
    pub segments: Vec<Segment>,
    /// Absolute pattern up to and including this node.
    pub full_pattern: String,
    pub parent: Option<RouteId>,
    /// 0 for top-level routes.
    pub depth: usize,
    pub children: Vec<RouteId>,
    pub handlers: RouteHandlers,
}

impl RouteNode {
    pub fn has_loader(&self) -> bool {
        self.handlers.loader.is_some()
    }

    pub fn has_action(&self) -> bool {
        self.handlers.action.is_some()
    }

    pub fn has_error_boundary(&self) -> bool {
        self.handlers.error_boundary
    }

    pub fn is_index(&self) -> bool {
        self.kind == RouteKind::Index
    }

    pub fn is_pathless(&self) -> bool {
        self.kind == RouteKind::Pathless
    }

    pub fn is_resource(&self) -> bool {
        self.handlers.resource
    }

    /// Path routes are the only ones that contribute URL segments.
    pub fn contributes_path(&self) -> bool {
        matches!(self.kind, RouteKind::Path(_))
    }
}

/// One matchable root-to-leaf chain.
#[derive(Debug, Clone)]
pub struct RouteBranch {
    /// Absolute pattern, e.g. `/users/:id`.
    pub pattern: String,
    pub segments: Vec<Segment>,
    /// Chain of route ids, root first.
    pub route_ids: Vec<RouteId>,
    /// For each route of the chain, how many pattern segments end at it.
    pub segment_ends: Vec<usize>,
    pub score: i64,
    pub index: bool,
    order: usize,
}

impl RouteBranch {
    pub fn leaf(&self) -> &RouteId {
        // Branches are never built with an empty chain.
        &self.route_ids[self.route_ids.len() - 1]
    }
}

/// Immutable, validated and ranked route tree.
#[derive(Debug, Default)]
pub struct RouteTable {
    nodes: HashMap<RouteId, Arc<RouteNode>>,
    definition_order: Vec<RouteId>,
    roots: Vec<RouteId>,
    branches: Vec<RouteBranch>,
    collisions: Vec<RouteCollision>,
    case_sensitive: bool,
    version: u64,
}

struct Walk<'a> {
    config: &'a RouterConfig,
    nodes: HashMap<RouteId, Arc<RouteNode>>,
    definition_order: Vec<RouteId>,
    branches: Vec<RouteBranch>,
    post_order: usize,
}

/// Chain state inherited from ancestors.
#[derive(Clone, Default)]
struct Chain {
    route_ids: Vec<RouteId>,
    segments: Vec<Segment>,
    segment_ends: Vec<usize>,
}

impl RouteTable {
    /// Validate and compile a route tree.
    pub fn build(routes: Vec<Route>, config: &RouterConfig) -> Result<Self, BuildError> {
        let mut walk = Walk {
            config,
            nodes: HashMap::new(),
            definition_order: Vec::new(),
            branches: Vec::new(),
            post_order: 0,
        };

        let mut roots = Vec::with_capacity(routes.len());
        for route in routes {
            roots.push(route.id.clone());
            walk.visit(route, None, &Chain::default(), 0)?;
        }

        let mut branches = walk.branches;
        branches.sort_by(|a, b| b.score.cmp(&a.score).then(a.order.cmp(&b.order)));

        let collisions = detect_collisions(&branches, config.case_sensitive)?;
        for collision in &collisions {
            warn_log!("Route collision: {}", collision);
        }

        debug_log!(
            "Built route table: {} routes, {} branches, {} collisions",
            walk.nodes.len(),
            branches.len(),
            collisions.len()
        );

        Ok(Self {
            nodes: walk.nodes,
            definition_order: walk.definition_order,
            roots,
            branches,
            collisions,
            case_sensitive: config.case_sensitive,
            version: 0,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Arc<RouteNode>> {
        self.nodes.get(id)
    }

    /// Nodes in definition (pre-)order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<RouteNode>> {
        self.definition_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    pub fn roots(&self) -> &[RouteId] {
        &self.roots
    }

    /// Ranked branches, most specific first.
    pub fn branches(&self) -> &[RouteBranch] {
        &self.branches
    }

    pub fn collisions(&self) -> &[RouteCollision] {
        &self.collisions
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Registry version this table was published under (0 if never).
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `id` and its ancestors, root first.
    pub fn ancestry(&self, id: &str) -> Vec<Arc<RouteNode>> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(id);
        while let Some(node) = current {
            chain.push(Arc::clone(node));
            current = node.parent.as_ref().and_then(|p| self.nodes.get(p));
        }
        chain.reverse();
        chain
    }
}

impl Walk<'_> {
    fn visit(
        &mut self,
        route: Route,
        parent: Option<&RouteNode>,
        inherited: &Chain,
        depth: usize,
    ) -> Result<(), BuildError> {
        let Route {
            id,
            kind,
            handlers,
            children,
        } = route;

        if depth >= self.config.max_depth {
            return Err(BuildError::MaxDepthExceeded {
                id,
                max_depth: self.config.max_depth,
            });
        }
        if self.nodes.contains_key(&id) {
            return Err(BuildError::DuplicateRouteId { id });
        }
        if kind == RouteKind::Index && !children.is_empty() {
            return Err(BuildError::IndexWithChildren { id });
        }

        let parent_pattern = parent.map_or("/", |p| p.full_pattern.as_str());
        let own_segments = match &kind {
            RouteKind::Path(path) => own_segments(&id, path, parent_pattern, inherited)?,
            RouteKind::Index | RouteKind::Pathless => Vec::new(),
        };

        let mut chain = inherited.clone();
        chain.route_ids.push(id.clone());
        chain.segments.extend(own_segments.iter().cloned());
        chain.segment_ends.push(chain.segments.len());

        let node = RouteNode {
            id: id.clone(),
            kind: kind.clone(),
            segments: own_segments,
            full_pattern: pattern_string(&chain.segments),
            parent: parent.map(|p| p.id.clone()),
            depth,
            children: children.iter().map(|c| c.id.clone()).collect(),
            handlers,
        };
        // Registered before the children so duplicate ids below are caught.
        let node = Arc::new(node);
        self.nodes.insert(id.clone(), Arc::clone(&node));
        self.definition_order.push(id);

        for child in children {
            self.visit(child, Some(node.as_ref()), &chain, depth + 1)?;
        }

        if node.kind != RouteKind::Pathless {
            let index = node.is_index();
            self.branches.push(RouteBranch {
                pattern: node.full_pattern.clone(),
                score: compute_score(&chain.segments, index),
                segments: chain.segments,
                route_ids: chain.route_ids,
                segment_ends: chain.segment_ends,
                index,
                order: self.post_order,
            });
        }
        self.post_order += 1;
        Ok(())
    }
}

fn own_segments(
    id: &RouteId,
    path: &str,
    parent_pattern: &str,
    inherited: &Chain,
) -> Result<Vec<Segment>, BuildError> {
    let invalid = |reason: String| BuildError::InvalidPath {
        id: id.clone(),
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return parse_pattern(path).map_err(invalid);
    }

    let absolute = normalize_path(path);
    if !extends_path(parent_pattern, &absolute) {
        return Err(invalid(format!(
            "absolute child path must start with its parent path '{parent_pattern}'"
        )));
    }
    let all = parse_pattern(&absolute).map_err(invalid)?;
    let parent_len = inherited.segments.len();
    Ok(all.into_iter().skip(parent_len).collect())
}

/// Report branches whose URL shape is identical.
///
/// A branch shadowed by one of its own descendants (the index or a pathless
/// child) is plain nesting. Otherwise a lower score is a collision and an
/// equal score is ambiguous.
fn detect_collisions(
    branches: &[RouteBranch],
    case_sensitive: bool,
) -> Result<Vec<RouteCollision>, BuildError> {
    let mut winners: HashMap<String, Vec<&RouteBranch>> = HashMap::new();
    let mut collisions = Vec::new();
    let mut reported = HashSet::new();

    for branch in branches {
        let shape = pattern_shape(&branch.segments, case_sensitive);
        let earlier = winners.entry(shape).or_default();
        for winner in earlier.iter() {
            if winner.route_ids.starts_with(&branch.route_ids) {
                continue;
            }
            if winner.score == branch.score {
                return Err(BuildError::AmbiguousRoutes {
                    pattern: branch.pattern.clone(),
                    first: winner.leaf().clone(),
                    second: branch.leaf().clone(),
                });
            }
            if reported.insert((winner.leaf().clone(), branch.leaf().clone())) {
                collisions.push(RouteCollision {
                    pattern: branch.pattern.clone(),
                    winner: winner.leaf().clone(),
                    loser: branch.leaf().clone(),
                });
            }
        }
        earlier.push(branch);
    }

    Ok(collisions)
}
