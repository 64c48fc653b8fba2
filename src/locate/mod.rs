//! locate
//!
//! Find the application a user asked for.
//!
//! # Identifiers
//!
//! - `"module"` - import `module` and search it for an application
//! - `"module:name"` - import `module` and take the binding `name`
//!
//! Only the first colon splits; everything after it is the attribute name.
//!
//! # Search
//!
//! For a bare module the well-known names `app` and `application` are
//! tried in that order. If neither holds an application, every binding in
//! the namespace is scanned and the search succeeds only if exactly one
//! application is bound. Zero and several matches are the same error.
//!
//! An explicit `module:name` never falls back to searching. If `name` is a
//! factory it is called to build the application.

pub mod errors;
pub mod file;
pub mod registry;

pub use errors::NoAppError;
pub use file::{prepare_exec_for_file, SourceLayout};
pub use registry::{Binding, FactoryFn, Namespace, Registry};

use std::fmt;
use std::str::FromStr;

use crate::app::SharedApp;

/// Names probed before scanning a namespace.
pub const WELL_KNOWN_NAMES: [&str; 2] = ["app", "application"];

/// User-supplied application identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace part (everything before the first colon).
    pub fn module(&self) -> &str {
        self.split().0
    }

    /// Explicit attribute, if the identifier has a colon.
    pub fn attribute(&self) -> Option<&str> {
        self.split().1
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.0.split_once(':') {
            Some((module, attr)) => (module, Some(attr)),
            None => (&self.0, None),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Resolve `identifier` against `registry`.
pub fn locate_app(registry: &Registry, identifier: &Identifier) -> Result<SharedApp, NoAppError> {
    let module = identifier.module();
    tracing::debug!(%identifier, "locating application");
    let ns = registry.import(module)?;

    match identifier.attribute() {
        None => find_best_app(&ns),
        Some(attribute) => {
            let missing = || NoAppError::MissingAttribute {
                module: module.to_string(),
                attribute: attribute.to_string(),
            };
            match ns.get(attribute).ok_or_else(missing)? {
                Binding::App(app) => Ok(app.clone()),
                Binding::Factory(factory) => {
                    tracing::debug!(module, attribute, "calling application factory");
                    factory().map_err(|e| NoAppError::ImportFailed {
                        module: module.to_string(),
                        source: e.into(),
                    })
                }
                Binding::Value(_) => Err(missing()),
            }
        }
    }
}

/// Pick the one application bound in `ns`.
pub fn find_best_app(ns: &Namespace) -> Result<SharedApp, NoAppError> {
    for name in WELL_KNOWN_NAMES {
        if let Some(app) = ns.get(name).and_then(Binding::as_app) {
            return Ok(app.clone());
        }
    }

    let mut matches = ns.bindings().filter_map(|(_, b)| b.as_app());
    match (matches.next(), matches.next()) {
        (Some(app), None) => Ok(app.clone()),
        _ => Err(NoAppError::NotFound {
            module: ns.name().to_string(),
        }),
    }
}
