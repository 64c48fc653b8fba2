//! locate::errors
//!
//! Errors raised while finding or loading the application.

use std::path::PathBuf;

use thiserror::Error;

/// The application could not be located or loaded.
///
/// Every variant is reported to the user as a usage error. Only the
/// "not found" kind (see [`NoAppError::is_not_found`]) is treated as plain
/// absence when resolving app-contributed commands. An unknown module is
/// not of that kind, so a mistyped `--app` surfaces instead of hiding
/// behind "no such command".
#[derive(Debug, Error)]
pub enum NoAppError {
    /// Heuristic search found zero or several applications.
    #[error(
        "Failed to find application in module \"{module}\". Are you sure it contains an \
         application? Maybe you wrapped it in a middleware or you are using a factory \
         function (name it explicitly with \"{module}:<factory>\")."
    )]
    NotFound { module: String },

    /// `module:attribute` named an attribute that does not exist or is not an application.
    #[error("Failed to find application \"{attribute}\" in module \"{module}\".")]
    MissingAttribute { module: String, attribute: String },

    /// No namespace is registered under this name.
    #[error("Could not import \"{module}\". Is it registered with the application registry?")]
    ModuleNotFound { module: String },

    /// `--app` pointed at a file that is neither a source file nor a package marker.
    #[error(
        "The file provided ({}) does exist but is not a valid source file. This means that \
         it cannot be used as application. Please change the extension to {suffix}.",
        path.display()
    )]
    InvalidSource { path: PathBuf, suffix: String },

    /// Neither an import path nor a factory was configured.
    #[error(
        "Could not locate application. You did not provide FLASK_APP or the --app parameter."
    )]
    NotConfigured,

    /// The namespace loader itself failed.
    #[error("While importing \"{module}\", an error occurred: {source}")]
    ImportFailed {
        module: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl NoAppError {
    /// Whether the module was found but holds no matching application.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            NoAppError::NotFound { .. } | NoAppError::MissingAttribute { .. }
        )
    }

    /// Whether this is a configuration problem rather than a lookup failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, NoAppError::NotConfigured)
    }
}
