//! Unit tests for RouteParams merging and query/form parsing
//!
//! Tests for src/params.rs - verifying parent+child merge, collision
//! handling and repeated query keys.

use data_router::{QueryParams, RouteParams};

fn params(pairs: &[(&str, &str)]) -> RouteParams {
    let mut params = RouteParams::new();
    for (key, value) in pairs {
        params.insert((*key).to_string(), (*value).to_string());
    }
    params
}

#[test]
fn test_parent_child_merge() {
    let merged = RouteParams::merge(
        &params(&[("workspaceId", "1")]),
        &params(&[("projectId", "2")]),
    );
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.get("workspaceId"), Some(&"1".to_string()));
    assert_eq!(merged.get("projectId"), Some(&"2".to_string()));
}

#[test]
fn test_collision_handling() {
    // Child value wins
    let merged = RouteParams::merge(&params(&[("id", "old")]), &params(&[("id", "new")]));
    assert_eq!(merged.get("id"), Some(&"new".to_string()));
}

#[test]
fn test_empty_params() {
    let merged = RouteParams::merge(&RouteParams::new(), &params(&[("id", "1")]));
    assert_eq!(merged.len(), 1);
    assert!(RouteParams::new().is_subset_of(&merged));
}

#[test]
fn test_typed_access() {
    let params = params(&[("page", "3"), ("slug", "intro")]);
    assert_eq!(params.get_as::<u32>("page"), Some(3));
    assert_eq!(params.get_as::<u32>("slug"), None);
}

#[test]
fn test_query_repeated_keys_and_decoding() {
    let query = QueryParams::from_query_string("tag=a&tag=b&q=hello+world&x=%2Fy");
    assert_eq!(query.get("tag"), Some(&"a".to_string()));
    assert_eq!(query.get_all("tag").len(), 2);
    assert_eq!(query.get("q"), Some(&"hello world".to_string()));
    assert_eq!(query.get("x"), Some(&"/y".to_string()));
}

#[test]
fn test_form_round_trips_through_query_string() {
    let mut form = QueryParams::new();
    form.insert("title", "milk & eggs");
    form.insert("done", "false");
    let parsed = QueryParams::from_query_string(&form.to_query_string());
    assert_eq!(parsed.get("title"), Some(&"milk & eggs".to_string()));
    assert_eq!(parsed.get_as::<bool>("done"), Some(false));
}
