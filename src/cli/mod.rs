//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse group options and bind them into a [`crate::script_info::ScriptInfo`]
//! - Resolve commands from the group and from the loaded application
//! - Report errors with the right exit status
//!
//! # Architecture
//!
//! The CLI layer is thin. Locating the application is delegated to
//! [`crate::locate`], loading and caching it to [`crate::script_info`], and
//! serving it to [`crate::serving`].

pub mod args;
pub mod command;
pub mod commands;
pub mod error;
pub mod group;

pub use command::{Callback, Command, CommandRegistry, ExitStatus, Invocation};
pub use error::CliError;
pub use group::{app_factory, FlaskGroup, GroupOptions};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
