//! TOML route manifests.
//!
//! A manifest declares the route tree explicitly; handler names are bound to
//! code through a [`HandlerSet`].
//!
//! ```toml
//! [[routes]]
//! id = "root"
//! path = "/"
//! loader = "root"
//! error_boundary = true
//!
//!   [[routes.children]]
//!   id = "home"
//!   index = true
//!
//!   [[routes.children]]
//!   id = "user"
//!   path = "users/:id"
//!   loader = "user"
//!   action = "update_user"
//! ```
//!
//! Every diagnostic carries `file:line`; build errors point at the line of
//! the offending route's `id`.

use crate::config::{line_of, RouterConfig};
use crate::error::BuildError;
use crate::debug_log;
use crate::loader::{action_fn, loader_fn, Action, Loader, RouteResponse};
use crate::route::Route;
use crate::table::RouteTable;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use toml::Spanned;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: {message}")]
    Invalid {
        file: String,
        line: usize,
        message: String,
    },
}

impl ManifestError {
    /// 1-based line of the problem, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            ManifestError::Invalid { line, .. } => Some(*line),
            ManifestError::Io { .. } => None,
        }
    }
}

// ============================================================================
// Handler binding
// ============================================================================

/// Named loaders and actions a manifest can refer to.
#[derive(Default, Clone)]
pub struct HandlerSet {
    loaders: HashMap<String, Arc<dyn Loader>>,
    actions: HashMap<String, Arc<dyn Action>>,
    lenient: bool,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every name, known or not, to a handler answering `null`. Lets
    /// tooling check a manifest without the application's code.
    pub fn lenient() -> Self {
        Self {
            lenient: true,
            ..Self::default()
        }
    }

    pub fn loader(mut self, name: impl Into<String>, loader: impl Loader) -> Self {
        self.loaders.insert(name.into(), Arc::new(loader));
        self
    }

    pub fn action(mut self, name: impl Into<String>, action: impl Action) -> Self {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    fn find_loader(&self, name: &str) -> Option<Arc<dyn Loader>> {
        match self.loaders.get(name) {
            Some(loader) => Some(Arc::clone(loader)),
            None if self.lenient => Some(Arc::new(loader_fn(|_| async {
                Ok(RouteResponse::empty())
            }))),
            None => None,
        }
    }

    fn find_action(&self, name: &str) -> Option<Arc<dyn Action>> {
        match self.actions.get(name) {
            Some(action) => Some(Arc::clone(action)),
            None if self.lenient => Some(Arc::new(action_fn(|_| async {
                Ok(RouteResponse::empty())
            }))),
            None => None,
        }
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut loaders: Vec<_> = self.loaders.keys().collect();
        let mut actions: Vec<_> = self.actions.keys().collect();
        loaders.sort();
        actions.sort();
        f.debug_struct("HandlerSet")
            .field("loaders", &loaders)
            .field("actions", &actions)
            .field("lenient", &self.lenient)
            .finish()
    }
}

// ============================================================================
// Manifest
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteEntry {
    id: Spanned<String>,
    path: Option<String>,
    #[serde(default)]
    index: bool,
    loader: Option<Spanned<String>>,
    action: Option<Spanned<String>>,
    #[serde(default)]
    error_boundary: bool,
    #[serde(default)]
    resource: bool,
    #[serde(default)]
    children: Vec<RouteEntry>,
}

/// A parsed manifest, not yet bound to handlers.
#[derive(Debug)]
pub struct RouteManifest {
    file: String,
    content: String,
    routes: Vec<RouteEntry>,
}

/// Read and parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<RouteManifest, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(content, &path.display().to_string())
}

/// Parse manifest text. `file` labels diagnostics.
pub fn parse_manifest(content: String, file: &str) -> Result<RouteManifest, ManifestError> {
    let parsed: ManifestFile = toml::from_str(&content).map_err(|e| ManifestError::Invalid {
        file: file.to_string(),
        line: e.span().map_or(1, |span| line_of(&content, span.start)),
        message: e.message().to_string(),
    })?;
    debug_log!("Parsed manifest '{}' ({} top-level routes)", file, parsed.routes.len());
    Ok(RouteManifest {
        file: file.to_string(),
        content,
        routes: parsed.routes,
    })
}

impl RouteManifest {
    pub fn file(&self) -> &str {
        &self.file
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ManifestError {
        ManifestError::Invalid {
            file: self.file.clone(),
            line: line_of(&self.content, offset),
            message: message.into(),
        }
    }

    fn find_entry<'a>(entries: &'a [RouteEntry], id: &str) -> Option<&'a RouteEntry> {
        entries.iter().find_map(|entry| {
            if entry.id.get_ref() == id {
                Some(entry)
            } else {
                Self::find_entry(&entry.children, id)
            }
        })
    }

    /// Bind handler names and produce the route builders.
    pub fn routes(&self, handlers: &HandlerSet) -> Result<Vec<Route>, ManifestError> {
        self.routes
            .iter()
            .map(|entry| self.bind(entry, handlers))
            .collect()
    }

    fn bind(&self, entry: &RouteEntry, handlers: &HandlerSet) -> Result<Route, ManifestError> {
        let id = entry.id.get_ref().clone();
        let id_offset = entry.id.span().start;

        let mut route = match (&entry.path, entry.index) {
            (Some(_), true) => {
                return Err(self.error_at(
                    id_offset,
                    format!("route '{id}' sets both `path` and `index`"),
                ))
            }
            (Some(path), false) => Route::new(id.as_str(), path.as_str()),
            (None, true) => Route::index(id.as_str()),
            (None, false) => Route::layout(id.as_str()),
        };

        if let Some(name) = &entry.loader {
            let loader = handlers.find_loader(name.get_ref()).ok_or_else(|| {
                self.error_at(
                    name.span().start,
                    format!("route '{id}' names unknown loader '{}'", name.get_ref()),
                )
            })?;
            route = route.loader(loader);
        }
        if let Some(name) = &entry.action {
            let action = handlers.find_action(name.get_ref()).ok_or_else(|| {
                self.error_at(
                    name.span().start,
                    format!("route '{id}' names unknown action '{}'", name.get_ref()),
                )
            })?;
            route = route.action(action);
        }
        if entry.error_boundary {
            route = route.error_boundary();
        }
        if entry.resource {
            route = route.resource();
        }

        let children = entry
            .children
            .iter()
            .map(|child| self.bind(child, handlers))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(route.children(children))
    }

    /// Bind and compile into a [`RouteTable`].
    pub fn build(
        &self,
        handlers: &HandlerSet,
        config: &RouterConfig,
    ) -> Result<RouteTable, ManifestError> {
        let routes = self.routes(handlers)?;
        RouteTable::build(routes, config).map_err(|e| self.build_error(&e))
    }

    /// Point a table build error at its route's line.
    pub fn build_error(&self, error: &BuildError) -> ManifestError {
        let offset = error
            .route_id()
            .and_then(|id| Self::find_entry(&self.routes, id.as_str()))
            .map_or(0, |entry| entry.id.span().start);
        self.error_at(offset, error.to_string())
    }
}
