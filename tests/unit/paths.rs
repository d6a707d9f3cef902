//! Unit tests for path joining and basename handling
//!
//! Tests for src/nested.rs helpers used by the route table and the HTTP surface.

use data_router::nested::{extends_path, join_paths, strip_basename, with_basename};

#[test]
fn test_join_relative_child() {
    assert_eq!(join_paths("/", "dashboard"), "/dashboard");
    assert_eq!(join_paths("/dashboard/", "/analytics/"), "/dashboard/analytics");
    assert_eq!(join_paths("/", ""), "/");
}

#[test]
fn test_extends_path_is_segment_aware() {
    assert!(extends_path("/users", "/users"));
    assert!(extends_path("/users", "/users/1/posts"));
    assert!(!extends_path("/users", "/usersettings"));
    assert!(extends_path("/", "/anything"));
}

#[test]
fn test_basename_round_trip() {
    let full = with_basename("/reports/2024", "/app");
    assert_eq!(full, "/app/reports/2024");
    assert_eq!(strip_basename(&full, "/app").as_deref(), Some("/reports/2024"));
}

#[test]
fn test_basename_edges() {
    assert_eq!(with_basename("/", "/app"), "/app");
    assert_eq!(with_basename("/users", "/"), "/users");
    assert_eq!(strip_basename("/APP/users", "/app").as_deref(), Some("/users"));
    assert_eq!(strip_basename("/other", "/app"), None);
}
