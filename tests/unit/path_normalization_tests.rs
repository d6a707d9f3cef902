//! Unit tests for path normalization
//!
//! Tests the `normalize_path()` helper function to ensure consistent path handling.

use data_router::normalize_path;
use std::borrow::Cow;

#[test]
fn test_normalize_already_normalized() {
    assert!(matches!(normalize_path("/dashboard"), Cow::Borrowed("/dashboard")));
    assert!(matches!(normalize_path("/users/:id"), Cow::Borrowed(_)));
    assert_eq!(normalize_path("/"), "/");
}

#[test]
fn test_normalize_missing_leading_slash() {
    assert_eq!(normalize_path("dashboard"), "/dashboard");
    assert_eq!(normalize_path("users/:id"), "/users/:id");
}

#[test]
fn test_normalize_trailing_slash() {
    // Root keeps its single slash
    assert_eq!(normalize_path("/dashboard/"), "/dashboard");
    assert_eq!(normalize_path("dashboard/"), "/dashboard");
}

#[test]
fn test_normalize_root_variations() {
    assert_eq!(normalize_path(""), "/");
    assert_eq!(normalize_path("//"), "/");
    assert_eq!(normalize_path("///"), "/");
}

#[test]
fn test_normalize_repeated_slashes() {
    assert_eq!(normalize_path("/users//42"), "/users/42");
    assert_eq!(normalize_path("//files///a/b//"), "/files/a/b");
}

#[test]
fn test_normalize_keeps_data_suffix() {
    assert_eq!(normalize_path("/users/42.data"), "/users/42.data");
}
