//! app::instance
//!
//! A ready-made [`Application`] implementation.
//!
//! # Example
//!
//! ```
//! use flask_cli::app::{App, Application};
//! use flask_cli::http::{Handler, Request, Response};
//!
//! let app = App::builder("hello")
//!     .route("/", |_app, _req| Ok(Response::ok("Hello World!")))
//!     .build();
//!
//! let resp = app.call(&Request::new("GET", "/")).unwrap();
//! assert_eq!(resp.body_text(), "Hello World!");
//! assert!(!app.debug());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use super::{AppContext, Application, Config, ShellContext};
use crate::cli::command::{Command, CommandRegistry};
use crate::http::{Handler, Request, Response};

/// Route callback: receives the application and the request.
pub type RouteFn = Arc<dyn Fn(&App, &Request) -> Result<Response> + Send + Sync>;

type TeardownFn = Arc<dyn Fn(&App) + Send + Sync>;

/// A routed web application with its own commands and configuration.
pub struct App {
    import_name: String,
    instance_path: PathBuf,
    debug: AtomicBool,
    config: Config,
    cli: CommandRegistry,
    routes: BTreeMap<String, RouteFn>,
    shell_vars: ShellContext,
    teardown: Vec<TeardownFn>,
}

/// Summary of the application as seen from the shell.
#[derive(Debug, Serialize)]
struct AppSummary<'a> {
    import_name: &'a str,
    debug: bool,
    instance_path: &'a Path,
    routes: Vec<&'a str>,
}

impl App {
    pub fn builder(import_name: impl Into<String>) -> AppBuilder {
        AppBuilder::new(import_name)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registered route paths, sorted.
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

impl Handler for App {
    fn call(&self, request: &Request) -> Result<Response> {
        match self.routes.get(&request.path) {
            Some(route) => route(self, request),
            None => Ok(Response::not_found()),
        }
    }
}

impl Application for App {
    fn import_name(&self) -> &str {
        &self.import_name
    }

    fn instance_path(&self) -> &Path {
        &self.instance_path
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::Acquire)
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Release);
    }

    fn cli(&self) -> &CommandRegistry {
        &self.cli
    }

    fn app_context(self: Arc<Self>) -> AppContext {
        AppContext::push(self)
    }

    fn make_shell_context(&self) -> ShellContext {
        let mut ctx = self.shell_vars.clone();
        let summary = AppSummary {
            import_name: &self.import_name,
            debug: self.debug(),
            instance_path: &self.instance_path,
            routes: self.routes().collect(),
        };
        ctx.insert(
            "app".to_string(),
            serde_json::to_value(summary).unwrap_or(serde_json::Value::Null),
        );
        ctx.insert(
            "config".to_string(),
            serde_json::Value::Object(self.config.snapshot().into_iter().collect()),
        );
        ctx
    }

    fn route_paths(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    fn config(&self) -> Option<&Config> {
        Some(&self.config)
    }

    fn teardown_appcontext(&self) {
        for f in &self.teardown {
            f(self);
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("import_name", &self.import_name)
            .field("instance_path", &self.instance_path)
            .field("debug", &self.debug())
            .field("commands", &self.cli.list_commands())
            .field("routes", &self.routes().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`App`].
pub struct AppBuilder {
    import_name: String,
    instance_path: Option<PathBuf>,
    debug: bool,
    config: Config,
    cli: CommandRegistry,
    routes: BTreeMap<String, RouteFn>,
    shell_vars: ShellContext,
    teardown: Vec<TeardownFn>,
}

impl AppBuilder {
    fn new(import_name: impl Into<String>) -> Self {
        Self {
            import_name: import_name.into(),
            instance_path: None,
            debug: false,
            config: Config::new(),
            cli: CommandRegistry::new(),
            routes: BTreeMap::new(),
            shell_vars: ShellContext::new(),
            teardown: Vec::new(),
        }
    }

    /// Defaults to `./instance` relative to the working directory.
    pub fn instance_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.instance_path = Some(path.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Contribute a command to the CLI.
    pub fn command(mut self, command: Command) -> Self {
        self.cli.add_command(command);
        self
    }

    pub fn route<F>(mut self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&App, &Request) -> Result<Response> + Send + Sync + 'static,
    {
        self.routes.insert(path.into(), Arc::new(f));
        self
    }

    /// Extra name exposed to the shell.
    pub fn shell_var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.shell_vars.insert(name.into(), value.into());
        self
    }

    /// Run `f` whenever an application context is torn down.
    pub fn on_teardown<F>(mut self, f: F) -> Self
    where
        F: Fn(&App) + Send + Sync + 'static,
    {
        self.teardown.push(Arc::new(f));
        self
    }

    pub fn build(self) -> Arc<App> {
        let instance_path = self.instance_path.unwrap_or_else(|| {
            std::env::current_dir()
                .map(|dir| dir.join("instance"))
                .unwrap_or_else(|_| PathBuf::from("instance"))
        });
        Arc::new(App {
            import_name: self.import_name,
            instance_path,
            debug: AtomicBool::new(self.debug),
            config: self.config,
            cli: self.cli,
            routes: self.routes,
            shell_vars: self.shell_vars,
            teardown: self.teardown,
        })
    }
}
