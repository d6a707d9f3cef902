//! Unit tests for segment-based path matching
//!
//! Tests for src/matching.rs - verifying exact match, param extraction,
//! splats, scoring and no-match scenarios.

use data_router::matching::{
    compute_score, match_segments, parse_pattern, pattern_shape, split_path, Segment,
};

fn matches(pattern: &str, path: &str) -> Option<data_router::RouteParams> {
    let pattern = parse_pattern(pattern).unwrap();
    match_segments(&pattern, &split_path(path), false).map(|m| m.params)
}

#[test]
fn test_exact_literal_match() {
    let params = matches("/users/list", "/users/list").unwrap();
    assert!(params.is_empty());
}

#[test]
fn test_param_extraction() {
    let params = matches("/users/:id", "/users/123").unwrap();
    assert_eq!(params.get("id"), Some(&"123".to_string()));
}

#[test]
fn test_multiple_params() {
    let params = matches(
        "/workspace/:workspaceId/project/:projectId",
        "/workspace/123/project/456",
    )
    .unwrap();
    assert_eq!(params.get("workspaceId"), Some(&"123".to_string()));
    assert_eq!(params.get("projectId"), Some(&"456".to_string()));
}

#[test]
fn test_no_match_wrong_literal() {
    assert!(matches("/users/list", "/users/create").is_none());
}

#[test]
fn test_no_match_too_short_or_too_long() {
    assert!(matches("/users/:id/profile", "/users/123").is_none());
    // Every path segment has to be consumed
    assert!(matches("/users/:id", "/users/123/profile").is_none());
}

#[test]
fn test_splat_takes_the_rest() {
    let params = matches("/files/*", "/files/a/b/c.txt").unwrap();
    assert_eq!(params.splat(), Some("a/b/c.txt"));

    let consumed = match_segments(
        &parse_pattern("/files/*").unwrap(),
        &split_path("/files/a/b"),
        false,
    )
    .unwrap()
    .consumed;
    assert_eq!(consumed, vec![1, 3]);
}

#[test]
fn test_case_sensitivity_is_opt_in() {
    let pattern = parse_pattern("/About").unwrap();
    assert!(match_segments(&pattern, &split_path("/about"), false).is_some());
    assert!(match_segments(&pattern, &split_path("/about"), true).is_none());
}

#[test]
fn test_split_path_variants() {
    assert_eq!(split_path("/users/123"), vec!["users", "123"]);
    assert!(split_path("/").is_empty());
    assert!(split_path("").is_empty());
    assert_eq!(split_path("/users/"), vec!["users"]);
    assert_eq!(split_path("users/123/"), vec!["users", "123"]);
}

#[test]
fn test_parse_rejects_bad_patterns() {
    assert!(parse_pattern("/a/*/b").is_err());
    assert!(parse_pattern("/a/:").is_err());
    assert!(parse_pattern("/a/b*").is_err());
    assert_eq!(
        parse_pattern("users/:id").unwrap(),
        vec![Segment::Static("users".into()), Segment::Dynamic("id".into())]
    );
}

#[test]
fn test_scores() {
    let score = |p: &str, index: bool| compute_score(&parse_pattern(p).unwrap(), index);
    // segments + 1, static +10, dynamic +3, splat -2, index +2
    assert_eq!(score("/", false), 1);
    assert_eq!(score("/", true), 3);
    assert_eq!(score("/users", false), 12);
    assert_eq!(score("/users/:id", false), 16);
    assert_eq!(score("/users/*", false), 11);
}

#[test]
fn test_shape_ignores_param_names() {
    let a = pattern_shape(&parse_pattern("/users/:id").unwrap(), false);
    let b = pattern_shape(&parse_pattern("/Users/:slug").unwrap(), false);
    let c = pattern_shape(&parse_pattern("/Users/:slug").unwrap(), true);
    assert_eq!(a, b);
    assert_ne!(a, c);
}
