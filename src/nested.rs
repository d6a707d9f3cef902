//! Path helpers shared by the route table, the matcher and the HTTP surface.
//!
//! # Path Normalization
//!
//! 1. **Empty paths** are normalized to `"/"` (root)
//! 2. **Leading slashes** are ensured (`"dashboard"` → `"/dashboard"`)
//! 3. **Trailing slashes** are removed (except for root)
//! 4. **Repeated slashes** are collapsed (`"/a//b"` → `"/a/b"`)
//!
//! [`normalize_path()`] returns `Cow<str>` so that the common case (an
//! already-normalized path) does not allocate.

use std::borrow::Cow;

/// Strip leading and trailing slashes from a path.
#[inline]
pub(crate) fn trim_slashes(path: &str) -> &str {
    path.trim_start_matches('/').trim_end_matches('/')
}

/// Normalize a path for consistent comparison.
///
/// # Examples
///
/// ```
/// use data_router::normalize_path;
///
/// assert_eq!(normalize_path("/dashboard"), "/dashboard");
/// assert_eq!(normalize_path("dashboard/"), "/dashboard");
/// assert_eq!(normalize_path("//a///b"), "/a/b");
/// assert_eq!(normalize_path(""), "/");
/// ```
#[must_use]
pub fn normalize_path(path: &'_ str) -> Cow<'_, str> {
    if path == "/" {
        return Cow::Borrowed(path);
    }

    let already_normalized =
        path.starts_with('/') && !path.ends_with('/') && !path.contains("//");
    if already_normalized {
        return Cow::Borrowed(path);
    }

    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    Cow::Owned(format!("/{joined}"))
}

/// Join a parent's full path and a relative child path.
///
/// ```
/// use data_router::nested::join_paths;
///
/// assert_eq!(join_paths("/", "users"), "/users");
/// assert_eq!(join_paths("/users", ":id"), "/users/:id");
/// assert_eq!(join_paths("/users", ""), "/users");
/// ```
#[must_use]
pub fn join_paths(parent: &str, child: &str) -> String {
    let parent = trim_slashes(parent);
    let child = trim_slashes(child);
    match (parent.is_empty(), child.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{child}"),
        (false, true) => format!("/{parent}"),
        (false, false) => format!("/{parent}/{child}"),
    }
}

/// Whether `child` (an absolute path) lies at or under `parent`.
///
/// The comparison is segment-aware: `/users` extends to `/users/1` but not
/// to `/usersettings`.
#[must_use]
pub fn extends_path(parent: &str, child: &str) -> bool {
    let parent = normalize_path(parent);
    let child = normalize_path(child);
    if parent == "/" {
        return true;
    }
    child == parent
        || child
            .strip_prefix(parent.as_ref())
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Remove `basename` from the front of `pathname`.
///
/// Returns `None` when the path is outside the basename. Comparison is ASCII
/// case-insensitive and segment-aware.
///
/// ```
/// use data_router::nested::strip_basename;
///
/// assert_eq!(strip_basename("/app/users", "/app").as_deref(), Some("/users"));
/// assert_eq!(strip_basename("/app", "/app/").as_deref(), Some("/"));
/// assert_eq!(strip_basename("/application", "/app"), None);
/// ```
#[must_use]
pub fn strip_basename(pathname: &str, basename: &str) -> Option<String> {
    let base = normalize_path(basename);
    if base == "/" {
        return Some(normalize_path(pathname).into_owned());
    }
    let path = normalize_path(pathname);
    let head = path.get(..base.len())?;
    if !head.eq_ignore_ascii_case(&base) {
        return None;
    }
    let rest = &path[base.len()..];
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

/// Prefix a router-relative path with `basename`.
#[must_use]
pub fn with_basename(path: &str, basename: &str) -> String {
    let base = trim_slashes(basename);
    if base.is_empty() {
        return normalize_path(path).into_owned();
    }
    join_paths(base, path)
}
