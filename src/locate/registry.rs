//! locate::registry
//!
//! Named namespaces the locator can import applications from.
//!
//! # Overview
//!
//! A target codebase cannot be introspected at runtime in Rust, so the
//! embedding program registers each importable namespace up front. A
//! namespace is produced by a loader that runs the first time the
//! namespace is imported; the result is cached for the lifetime of the
//! registry, so a namespace body runs at most once (concurrent first
//! imports keep whichever result is stored first).
//!
//! The registry also carries the import search path. File-path
//! resolution prepends the directory containing the target package, and
//! the development server's reloader watches these directories.
//!
//! # Example
//!
//! ```
//! use flask_cli::app::App;
//! use flask_cli::locate::{Namespace, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register("hello", || Ok(Namespace::new("hello").app("app", App::builder("hello").build())));
//!
//! let ns = registry.import("hello").unwrap();
//! assert_eq!(ns.names().collect::<Vec<_>>(), vec!["app"]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::Result;

use super::errors::NoAppError;
use super::file::SourceLayout;
use crate::app::{Application, SharedApp};

/// Zero-argument application factory bound in a namespace.
pub type FactoryFn = Arc<dyn Fn() -> Result<SharedApp> + Send + Sync>;

type NamespaceLoader = Arc<dyn Fn() -> Result<Namespace> + Send + Sync>;

/// A value bound to a name inside a namespace.
#[derive(Clone)]
pub enum Binding {
    /// An application instance.
    App(SharedApp),
    /// An entry point that builds an application when named explicitly.
    Factory(FactoryFn),
    /// Anything else.
    Value(serde_json::Value),
}

impl Binding {
    /// The application, if this binding holds one directly.
    pub fn as_app(&self) -> Option<&SharedApp> {
        match self {
            Binding::App(app) => Some(app),
            _ => None,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::App(app) => f.debug_tuple("App").field(&app.import_name()).finish(),
            Binding::Factory(_) => f.write_str("Factory(..)"),
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// The top-level bindings of one importable namespace, in binding order.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    name: String,
    bindings: Vec<(String, Binding)>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    /// Bind `name`, replacing an earlier binding of the same name in place.
    pub fn bind(mut self, name: impl Into<String>, binding: Binding) -> Self {
        let name = name.into();
        match self.bindings.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = binding,
            None => self.bindings.push((name, binding)),
        }
        self
    }

    pub fn app(self, name: impl Into<String>, app: SharedApp) -> Self {
        self.bind(name, Binding::App(app))
    }

    pub fn factory<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<SharedApp> + Send + Sync + 'static,
    {
        self.bind(name, Binding::Factory(Arc::new(f)))
    }

    pub fn value(self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.bind(name, Binding::Value(value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    /// Bound names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(n, _)| n.as_str())
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(n, b)| (n.as_str(), b))
    }
}

/// Registered namespaces plus the import search path.
pub struct Registry {
    loaders: HashMap<String, NamespaceLoader>,
    modules: Mutex<HashMap<String, Arc<Namespace>>>,
    search_path: RwLock<Vec<PathBuf>>,
    layout: SourceLayout,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_layout(SourceLayout::default())
    }

    /// A registry resolving files with a custom source layout.
    pub fn with_layout(layout: SourceLayout) -> Self {
        Self {
            loaders: HashMap::new(),
            modules: Mutex::new(HashMap::new()),
            search_path: RwLock::new(Vec::new()),
            layout,
        }
    }

    /// Register a namespace under its dotted name.
    ///
    /// The loader runs on first import only.
    pub fn register<F>(&mut self, name: impl Into<String>, loader: F)
    where
        F: Fn() -> Result<Namespace> + Send + Sync + 'static,
    {
        self.loaders.insert(name.into(), Arc::new(loader));
    }

    /// Register a namespace exposing a single factory-built application as `app`.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<SharedApp> + Send + Sync + 'static,
    {
        let name = name.into();
        let ns_name = name.clone();
        self.register(name, move || Ok(Namespace::new(ns_name.clone()).app("app", factory()?)));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    /// Names of all registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Import a namespace, running its loader if it has not run yet.
    pub fn import(&self, name: &str) -> Result<Arc<Namespace>, NoAppError> {
        if let Some(ns) = self.lock_modules().get(name) {
            return Ok(Arc::clone(ns));
        }

        let loader = self
            .loaders
            .get(name)
            .ok_or_else(|| NoAppError::ModuleNotFound {
                module: name.to_string(),
            })?;

        tracing::debug!(module = name, "importing namespace");
        // The modules lock is not held here so loaders may import other namespaces.
        let ns = loader().map_err(|e| NoAppError::ImportFailed {
            module: name.to_string(),
            source: e.into(),
        })?;

        let mut modules = self.lock_modules();
        let ns = modules
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ns));
        Ok(Arc::clone(ns))
    }

    /// Put `dir` at the front of the search path.
    pub fn prepend_search_path(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        tracing::debug!(dir = %dir.display(), "prepending to search path");
        self.search_path
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, dir);
    }

    /// Add `dir` to the front of the search path unless it is already present.
    pub fn ensure_search_path(&self, dir: &Path) {
        let present = self
            .search_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p == dir);
        if !present {
            self.prepend_search_path(dir);
        }
    }

    pub fn search_path(&self) -> Vec<PathBuf> {
        self.search_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    fn lock_modules(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Namespace>>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("namespaces", &self.namespaces())
            .field("search_path", &self.search_path())
            .field("layout", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::app::App;

    #[test]
    fn import_runs_loader_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&runs);
        let mut registry = Registry::new();
        registry.register("counted", move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Namespace::new("counted").value("x", 1))
        });

        let a = registry.import("counted").unwrap();
        let b = registry.import("counted").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_namespace_is_module_not_found() {
        let registry = Registry::new();
        let err = registry.import("nope").unwrap_err();
        assert!(matches!(err, NoAppError::ModuleNotFound { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn failing_loader_is_import_failed_and_retried() {
        let runs = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&runs);
        let mut registry = Registry::new();
        registry.register("broken", move || {
            seen.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("syntax error")
        });

        let err = registry.import("broken").unwrap_err();
        assert!(matches!(err, NoAppError::ImportFailed { .. }));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("syntax error"));

        let _ = registry.import("broken");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rebinding_keeps_position() {
        let ns = Namespace::new("m")
            .value("a", 1)
            .value("b", 2)
            .value("a", 3);
        assert_eq!(ns.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(matches!(ns.get("a"), Some(Binding::Value(v)) if *v == 3));
    }

    #[test]
    fn register_factory_binds_app() {
        let mut registry = Registry::new();
        registry.register_factory("made", || Ok(App::builder("made").build() as SharedApp));
        let ns = registry.import("made").unwrap();
        assert_eq!(
            ns.get("app").and_then(Binding::as_app).unwrap().import_name(),
            "made"
        );
    }

    #[test]
    fn search_path_prepends_without_duplicates() {
        let registry = Registry::new();
        registry.prepend_search_path("/a");
        registry.ensure_search_path(Path::new("/b"));
        registry.ensure_search_path(Path::new("/a"));
        assert_eq!(
            registry.search_path(),
            vec![PathBuf::from("/b"), PathBuf::from("/a")]
        );
    }
}
