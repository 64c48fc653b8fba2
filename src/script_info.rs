//! script_info
//!
//! Per-invocation configuration and application cache.
//!
//! # Lifecycle
//!
//! One [`ScriptInfo`] is created per CLI invocation. Option binding fills
//! in the import path, the debug override and [`ScriptInfo::data`]; after
//! that it is shared read-only (behind an `Arc`) with commands and, through
//! [`crate::dispatch::LazyDispatcher`], with server workers.
//!
//! # Invariants
//!
//! - [`ScriptInfo::load_app`] produces at most one application per
//!   `ScriptInfo`; the debug override is applied before the application is
//!   cached
//! - `load_app` is meant for the single CLI thread. Concurrent callers must
//!   synchronize themselves (the dispatcher does); a racing duplicate load
//!   is discarded in favour of the cached instance

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use anyhow::Result;

use crate::app::{AppContext, Application, SharedApp};
use crate::locate::{locate_app, Identifier, NoAppError, Registry};

/// Application factory configured on the command group.
pub type AppFactory = Arc<dyn Fn(&ScriptInfo) -> Result<SharedApp> + Send + Sync>;

/// Everything needed to produce the application for one invocation.
pub struct ScriptInfo {
    /// Identifier of the application (`--app` / `FLASK_APP`).
    pub app_import_path: Option<String>,
    /// Debug override (`--debug` / `--no-debug` / `FLASK_DEBUG`).
    pub debug: Option<bool>,
    /// Builds the application instead of locating it.
    pub create_app: Option<AppFactory>,
    /// Arbitrary values stored by script-info options.
    pub data: BTreeMap<String, serde_json::Value>,
    registry: Arc<Registry>,
    loaded_app: OnceLock<SharedApp>,
}

impl ScriptInfo {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            app_import_path: None,
            debug: None,
            create_app: None,
            data: BTreeMap::new(),
            registry,
            loaded_app: OnceLock::new(),
        }
    }

    pub fn with_import_path(mut self, path: impl Into<String>) -> Self {
        self.app_import_path = Some(path.into());
        self
    }

    pub fn with_debug(mut self, debug: Option<bool>) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_create_app<F>(mut self, create_app: F) -> Self
    where
        F: Fn(&ScriptInfo) -> Result<SharedApp> + Send + Sync + 'static,
    {
        self.create_app = Some(Arc::new(create_app));
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The application if it has been loaded already.
    pub fn loaded_app(&self) -> Option<&SharedApp> {
        self.loaded_app.get()
    }

    /// Load the application, or return the one loaded before.
    ///
    /// # Errors
    ///
    /// - [`NoAppError::NotConfigured`] without a factory or import path
    /// - any [`NoAppError`] from locating the application
    /// - whatever the factory returns
    pub fn load_app(&self) -> Result<SharedApp> {
        if let Some(app) = self.loaded_app.get() {
            return Ok(Arc::clone(app));
        }

        let app = match (&self.create_app, &self.app_import_path) {
            (Some(create_app), _) => {
                tracing::debug!("creating application through factory");
                create_app(self)?
            }
            (None, Some(path)) => locate_app(&self.registry, &Identifier::new(path.as_str()))?,
            (None, None) => return Err(NoAppError::NotConfigured.into()),
        };

        if let Some(debug) = self.debug {
            app.set_debug(debug);
        }
        tracing::debug!(app = app.import_name(), debug = app.debug(), "application loaded");
        Ok(Arc::clone(self.loaded_app.get_or_init(|| app)))
    }

    /// Enter the application context when `with_context` is set.
    ///
    /// The returned guard keeps the context active until dropped.
    pub fn conditional_context(&self, with_context: bool) -> Result<Option<AppContext>> {
        if !with_context {
            return Ok(None);
        }
        Ok(Some(self.load_app()?.app_context()))
    }
}

impl fmt::Debug for ScriptInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptInfo")
            .field("app_import_path", &self.app_import_path)
            .field("debug", &self.debug)
            .field("create_app", &self.create_app.is_some())
            .field("data", &self.data)
            .field("loaded", &self.loaded_app.get().map(|a| a.import_name()))
            .finish()
    }
}
