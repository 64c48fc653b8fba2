//! dispatch
//!
//! Deferred, load-once request handler.
//!
//! # Overview
//!
//! [`LazyDispatcher`] wraps a loader. The first request (or construction,
//! in eager mode) runs the loader; every later request is forwarded to the
//! cached value. Loading the application on first request instead of at
//! startup lets import and configuration errors surface per request.
//!
//! # Invariants
//!
//! - The loader runs at most once successfully; a failed load is not
//!   cached, so the next request retries
//! - The cached value is published through a [`OnceLock`], so readers on
//!   the lock-free fast path see either nothing or the complete value
//! - Concurrent first requests serialize on an internal mutex; the loser
//!   re-checks after acquiring it and reuses the winner's value
//!
//! # Example
//!
//! ```
//! use flask_cli::dispatch::LazyDispatcher;
//!
//! let lazy = LazyDispatcher::new(|| Ok(String::from("loaded")), false).unwrap();
//! assert!(!lazy.is_loaded());
//! assert_eq!(lazy.get().unwrap(), "loaded");
//! assert!(lazy.is_loaded());
//! ```

use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use anyhow::Result;

use crate::app::SharedApp;
use crate::http::{Handler, Request, Response};

type Loader<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// Handler that loads its target on first use.
pub struct LazyDispatcher<T = SharedApp> {
    loader: Loader<T>,
    loaded: OnceLock<T>,
    lock: Mutex<()>,
}

impl<T> LazyDispatcher<T> {
    /// Wrap `loader`. With `use_eager_loading` the loader runs right away
    /// and its error is returned from here.
    pub fn new<F>(loader: F, use_eager_loading: bool) -> Result<Self>
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let dispatcher = Self {
            loader: Box::new(loader),
            loaded: OnceLock::new(),
            lock: Mutex::new(()),
        };
        if use_eager_loading {
            tracing::debug!("eager loading application");
            dispatcher.get()?;
        }
        Ok(dispatcher)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// The loaded value, loading it first if needed.
    pub fn get(&self) -> Result<&T> {
        if let Some(value) = self.loaded.get() {
            return Ok(value);
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.loaded.get() {
            return Ok(value);
        }
        tracing::debug!("loading application on first request");
        let value = (self.loader)()?;
        Ok(self.loaded.get_or_init(|| value))
    }
}

impl<T: Handler> Handler for LazyDispatcher<T> {
    fn call(&self, request: &Request) -> Result<Response> {
        self.get()?.call(request)
    }
}

impl<T> fmt::Debug for LazyDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDispatcher")
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
