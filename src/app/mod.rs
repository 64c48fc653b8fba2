//! app
//!
//! The application contract the command-line front end works against.
//!
//! # Overview
//!
//! - [`Application`] - what a loaded application must expose (command
//!   registry, context scope, debug flag, metadata, shell namespace)
//! - [`AppContext`] - the ambient execution scope; while a guard is alive
//!   [`current_app`] returns its application on that thread
//! - [`App`] - a ready-made application type with routes, commands,
//!   configuration and teardown callbacks
//!
//! # Invariants
//!
//! - Context scopes nest per thread and unwind in LIFO order
//! - Dropping an [`AppContext`] removes its own entry and runs teardown,
//!   including during unwinding. A guard dropped out of order leaves the
//!   other entries untouched

pub mod config;
pub mod instance;

pub use config::{Config, ConfigError};
pub use instance::{App, AppBuilder};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::cli::command::CommandRegistry;
use crate::http::Handler;

/// A loaded application, shared between the CLI and server workers.
pub type SharedApp = Arc<dyn Application>;

/// Names and values made available to the interactive shell.
pub type ShellContext = BTreeMap<String, serde_json::Value>;

/// Contract every loadable application fulfils.
pub trait Application: Handler {
    /// Name the application was created under (shown in the shell banner).
    fn import_name(&self) -> &str;

    /// Folder for instance-local files.
    fn instance_path(&self) -> &Path;

    fn debug(&self) -> bool;

    /// Override the debug flag. Must be callable through a shared reference.
    fn set_debug(&self, debug: bool);

    /// Commands contributed by the application.
    fn cli(&self) -> &CommandRegistry;

    /// Enter the application's execution scope.
    fn app_context(self: Arc<Self>) -> AppContext;

    /// Namespace handed to the `shell` command.
    fn make_shell_context(&self) -> ShellContext;

    /// Paths the application answers, sorted.
    fn route_paths(&self) -> Vec<String> {
        Vec::new()
    }

    /// Configuration store, if the application keeps one.
    fn config(&self) -> Option<&Config> {
        None
    }

    /// Called when an [`AppContext`] for this application is torn down.
    fn teardown_appcontext(&self) {}
}

impl fmt::Debug for dyn Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("import_name", &self.import_name())
            .field("debug", &self.debug())
            .finish()
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<SharedApp>> = const { RefCell::new(Vec::new()) };
}

/// Guard for an active application context.
///
/// The guard is tied to the thread that created it.
pub struct AppContext {
    app: SharedApp,
    _not_send: PhantomData<Rc<()>>,
}

impl AppContext {
    /// Push `app` onto this thread's context stack.
    pub fn push(app: SharedApp) -> Self {
        tracing::debug!(app = app.import_name(), "pushing app context");
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Arc::clone(&app)));
        Self {
            app,
            _not_send: PhantomData,
        }
    }

    /// The application this context was created for.
    pub fn app(&self) -> &SharedApp {
        &self.app
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|app| Arc::ptr_eq(app, &self.app)) {
                stack.remove(pos);
            }
        });
        self.app.teardown_appcontext();
        tracing::debug!(app = self.app.import_name(), "popped app context");
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("app", &self.app.import_name())
            .finish()
    }
}

/// The application of the innermost active context on this thread.
pub fn current_app() -> Option<SharedApp> {
    CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Whether any application context is active on this thread.
pub fn has_app_context() -> bool {
    CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_nests_and_unwinds() {
        let outer: SharedApp = App::builder("outer").build();
        let inner: SharedApp = App::builder("inner").build();
        assert!(!has_app_context());

        let outer_ctx = Arc::clone(&outer).app_context();
        {
            let _inner_ctx = Arc::clone(&inner).app_context();
            assert_eq!(current_app().unwrap().import_name(), "inner");
        }
        assert_eq!(current_app().unwrap().import_name(), "outer");
        drop(outer_ctx);
        assert!(current_app().is_none());
    }

    #[test]
    fn out_of_order_drop_keeps_inner_current() {
        let outer: SharedApp = App::builder("outer").build();
        let inner: SharedApp = App::builder("inner").build();

        let outer_ctx = Arc::clone(&outer).app_context();
        let inner_ctx = Arc::clone(&inner).app_context();
        drop(outer_ctx);
        assert_eq!(current_app().unwrap().import_name(), "inner");

        let again = Arc::clone(&outer).app_context();
        drop(inner_ctx);
        assert_eq!(current_app().unwrap().import_name(), "outer");
        drop(again);
        assert!(!has_app_context());
    }

    #[test]
    fn shared_app_formats_with_debug() {
        let app: SharedApp = App::builder("shop").debug(true).build();
        let text = format!("{app:?}");
        assert!(text.contains("\"shop\""));
        assert!(text.contains("debug: true"));

        let missing: Result<SharedApp, &str> = Err("nope");
        assert_eq!(missing.unwrap_err(), "nope");
    }

    #[test]
    fn context_is_popped_during_unwind() {
        let app: SharedApp = App::builder("unwind").build();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = Arc::clone(&app).app_context();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!has_app_context());
    }
}
