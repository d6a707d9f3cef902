//! Segment-level path patterns.
//!
//! A route path is split on `/` into [`Segment`]s:
//!
//! - `users`: static, compared literally (ASCII case-insensitive by default)
//! - `:id`: dynamic, captures one path segment
//! - `*`: splat, captures the rest of the path (possibly empty); only valid
//!   as the last segment
//!
//! Scoring follows a fixed specificity table so that for any pathname the
//! most specific branch is tried first:
//!
//! | Piece             | Score |
//! |-------------------|-------|
//! | every segment     | +1    |
//! | leading root      | +1    |
//! | static segment    | +10   |
//! | dynamic segment   | +3    |
//! | splat present     | -2    |
//! | index route       | +2    |

use crate::params::{RouteParams, SPLAT_PARAM};
use std::fmt;

const STATIC_SEGMENT_VALUE: i64 = 10;
const DYNAMIC_SEGMENT_VALUE: i64 = 3;
const INDEX_ROUTE_VALUE: i64 = 2;
const SPLAT_PENALTY: i64 = -2;

/// One `/`-separated piece of a route path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Static(String),
    Dynamic(String),
    Splat,
}

impl Segment {
    /// Parse a single raw segment.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw == "*" {
            return Ok(Self::Splat);
        }
        if let Some(name) = raw.strip_prefix(':') {
            if name.is_empty() {
                return Err("dynamic segment ':' has no parameter name".to_string());
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(format!("invalid parameter name ':{name}'"));
            }
            return Ok(Self::Dynamic(name.to_string()));
        }
        if raw.contains('*') {
            return Err(format!("'*' must be a whole segment, found '{raw}'"));
        }
        Ok(Self::Static(raw.to_string()))
    }

    fn value(&self) -> i64 {
        match self {
            Self::Static(_) => STATIC_SEGMENT_VALUE,
            Self::Dynamic(_) => DYNAMIC_SEGMENT_VALUE,
            Self::Splat => 0,
        }
    }

    /// Segment with parameter names erased, for shape comparison.
    fn shape(&self) -> &str {
        match self {
            Self::Static(s) => s,
            Self::Dynamic(_) => ":",
            Self::Splat => "*",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(s) => f.write_str(s),
            Self::Dynamic(name) => write!(f, ":{name}"),
            Self::Splat => f.write_str("*"),
        }
    }
}

/// Split a path into non-empty segments.
///
/// ```
/// use data_router::matching::split_path;
///
/// assert_eq!(split_path("/users//42/"), vec!["users", "42"]);
/// assert!(split_path("/").is_empty());
/// ```
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parse a relative or absolute route path into segments.
///
/// A splat anywhere but last is rejected.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, String> {
    let raw = split_path(pattern);
    let mut segments = Vec::with_capacity(raw.len());
    for (i, piece) in raw.iter().enumerate() {
        let segment = Segment::parse(piece)?;
        if segment == Segment::Splat && i + 1 != raw.len() {
            return Err("'*' is only allowed as the last segment".to_string());
        }
        segments.push(segment);
    }
    Ok(segments)
}

/// Render segments back to an absolute pattern (`/users/:id`).
pub fn pattern_string(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&segment.to_string());
    }
    out
}

/// Pattern with parameter names erased: `/users/:id` and `/users/:slug`
/// share the shape `/users/:`.
pub fn pattern_shape(segments: &[Segment], case_sensitive: bool) -> String {
    let mut out = String::from("/");
    let joined = segments
        .iter()
        .map(Segment::shape)
        .collect::<Vec<_>>()
        .join("/");
    out.push_str(&joined);
    if case_sensitive {
        out
    } else {
        out.to_ascii_lowercase()
    }
}

/// Specificity score of a full branch pattern.
///
/// ```
/// use data_router::matching::{compute_score, parse_pattern};
///
/// let static_score = compute_score(&parse_pattern("/a/b").unwrap(), false);
/// let dynamic_score = compute_score(&parse_pattern("/a/:b").unwrap(), false);
/// let splat_score = compute_score(&parse_pattern("/a/*").unwrap(), false);
/// assert!(static_score > dynamic_score && dynamic_score > splat_score);
/// ```
pub fn compute_score(segments: &[Segment], index: bool) -> i64 {
    let count = i64::try_from(segments.len()).unwrap_or(i64::MAX / 2);
    let mut score = count + 1;
    if segments.contains(&Segment::Splat) {
        score += SPLAT_PENALTY;
    }
    if index {
        score += INDEX_ROUTE_VALUE;
    }
    score + segments.iter().map(Segment::value).sum::<i64>()
}

/// Successful match of a full pattern against a path.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMatch {
    /// Captured params, keyed by name (`*` for the splat).
    pub params: RouteParams,
    /// For each pattern segment, how many path segments had been consumed
    /// once it matched. A splat consumes everything that remains.
    pub consumed: Vec<usize>,
}

/// Match a full pattern against the complete list of path segments.
///
/// Every path segment must be consumed unless the pattern ends in a splat.
pub fn match_segments(
    pattern: &[Segment],
    path: &[&str],
    case_sensitive: bool,
) -> Option<SegmentMatch> {
    let mut params = RouteParams::new();
    let mut consumed = Vec::with_capacity(pattern.len());
    let mut position = 0;

    for segment in pattern {
        match segment {
            Segment::Splat => {
                params.insert(SPLAT_PARAM.to_string(), path[position..].join("/"));
                position = path.len();
            }
            Segment::Dynamic(name) => {
                let value = path.get(position)?;
                params.insert(name.clone(), (*value).to_string());
                position += 1;
            }
            Segment::Static(expected) => {
                let value = path.get(position)?;
                let equal = if case_sensitive {
                    expected == value
                } else {
                    expected.eq_ignore_ascii_case(value)
                };
                if !equal {
                    return None;
                }
                position += 1;
            }
        }
        consumed.push(position);
    }

    (position == path.len()).then_some(SegmentMatch { params, consumed })
}
