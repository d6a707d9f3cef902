//! Unit tests module
//!
//! Contains unit tests for individual functions and components.

mod path_normalization_tests;
mod paths;

#[cfg(feature = "cache")]
mod cache;
mod matching;
mod params;
// resolve tests are in tests/resolve_tests.rs (separate compilation unit)
