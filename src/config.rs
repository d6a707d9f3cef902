//! Router configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file is valid.
//!
//! ```toml
//! basename = "/app"
//! origin = "https://example.com"
//! max_redirects = 10
//! max_depth = 16
//! case_sensitive = false
//! data_suffix = ".data"
//! cache_capacity = 1000
//! ```
//!
//! Validation is semantic (serde handles syntax) and reports every problem,
//! not just the first.

use crate::error::RouterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Prefix stripped from every incoming path.
    pub basename: String,
    /// Origin relative hrefs resolve against; redirects elsewhere are external.
    pub origin: String,
    pub max_redirects: usize,
    pub max_depth: usize,
    pub case_sensitive: bool,
    /// Suffix marking single-fetch data requests.
    pub data_suffix: String,
    pub cache_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            basename: "/".to_string(),
            origin: "http://localhost".to_string(),
            max_redirects: 10,
            max_depth: 16,
            case_sensitive: false,
            data_suffix: ".data".to_string(),
            cache_capacity: 1000,
        }
    }
}

impl RouterConfig {
    /// Parsed [`origin`](Self::origin).
    pub fn origin_url(&self) -> Result<Url, RouterError> {
        Url::parse(&self.origin).map_err(|e| RouterError::InvalidUrl {
            url: self.origin.clone(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut fail = |field: &'static str, message: String| {
            errors.push(ValidationError { field, message });
        };

        if !self.basename.starts_with('/') {
            fail("basename", format!("must start with '/', got '{}'", self.basename));
        }
        match Url::parse(&self.origin) {
            Ok(url) if url.cannot_be_a_base() => {
                fail("origin", format!("'{}' cannot be a base url", self.origin));
            }
            Ok(_) => {}
            Err(e) => fail("origin", format!("'{}': {e}", self.origin)),
        }
        if self.max_depth == 0 {
            fail("max_depth", "must be at least 1".to_string());
        }
        if !self.data_suffix.starts_with('.') || self.data_suffix.len() < 2 {
            fail(
                "data_suffix",
                format!("must look like '.data', got '{}'", self.data_suffix),
            );
        }
        if self.cache_capacity == 0 {
            fail("cache_capacity", "must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_toml_str(&content, &path.display().to_string())
}

/// Parse and validate configuration text. `file` labels diagnostics.
pub fn from_toml_str(content: &str, file: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: file.to_string(),
        line: e.span().map_or(1, |span| line_of(content, span.start)),
        message: e.message().to_string(),
    })?;
    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
