//! Test utilities for router integration tests
//!
//! Provides fixtures, counting handlers, request builders and assertion helpers.

#![allow(dead_code)]

use data_router::*;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Initialise `env_logger` once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn build_table(routes: Vec<Route>) -> RouteTable {
    RouteTable::build(routes, &RouterConfig::default()).expect("route table should build")
}

/// Route ids of the match stack for `path`, root first.
pub fn resolve_ids(table: &RouteTable, path: &str) -> Option<Vec<String>> {
    resolve_match_stack(table, path)
        .map(|stack| stack.iter().map(|e| e.route.id.to_string()).collect())
}

/// Loader answering `value`.
pub fn data_loader(value: Value) -> impl Loader {
    loader_fn(move |_| {
        let value = value.clone();
        async move { Ok(RouteResponse::data(value)) }
    })
}

/// Loader answering with its matched params.
pub fn params_loader() -> impl Loader {
    loader_fn(|args: LoaderArgs| async move {
        let params: serde_json::Map<String, Value> = args
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Ok(RouteResponse::data(Value::Object(params)))
    })
}

/// Shared call counter for handlers.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Loader answering `value` and counting its calls.
pub fn counting_loader(counter: &CallCounter, value: Value) -> impl Loader {
    let counter = counter.clone();
    loader_fn(move |_| {
        counter.hit();
        let value = value.clone();
        async move { Ok(RouteResponse::data(value)) }
    })
}

/// Records the order handlers were called in.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Assert that route parameters contain expected key-value pair
pub fn assert_param_equals(params: &RouteParams, key: &str, expected: &str) {
    let value = params.get(key);
    assert!(
        value.is_some(),
        "Parameter '{}' not found in RouteParams",
        key
    );
    assert_eq!(
        value.unwrap(),
        expected,
        "Parameter '{}' has wrong value",
        key
    );
}

pub fn form(pairs: &[(&str, &str)]) -> FormData {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

// ---- HTTP helpers ----

pub fn get(uri: &str) -> http::Request<String> {
    http::Request::builder()
        .method(http::Method::GET)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

pub fn head(uri: &str) -> http::Request<String> {
    http::Request::builder()
        .method(http::Method::HEAD)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

pub fn post(uri: &str, body: &str) -> http::Request<String> {
    http::Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

pub fn body_json(response: &http::Response<String>) -> Value {
    serde_json::from_str(response.body()).expect("response body should be JSON")
}
