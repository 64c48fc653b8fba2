//! cli::error
//!
//! Errors surfaced by the command group and how they map to exit codes.

use thiserror::Error;

use super::command::ExitStatus;
use crate::locate::NoAppError;

/// Errors from parsing, resolving or invoking a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing failed (or help/version was requested).
    #[error(transparent)]
    Parse(#[from] clap::Error),

    /// Neither the group nor the application knows the command.
    #[error("No such command '{0}'.")]
    NoSuchCommand(String),

    /// The application could not be located or configured.
    #[error(transparent)]
    NoApp(#[from] NoAppError),

    /// The command itself failed.
    #[error(transparent)]
    Command(anyhow::Error),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<NoAppError>() {
            Ok(no_app) => CliError::NoApp(no_app),
            Err(err) => CliError::Command(err),
        }
    }
}

impl CliError {
    /// Whether this is reported as a usage error.
    pub fn is_usage(&self) -> bool {
        matches!(self, CliError::NoSuchCommand(_) | CliError::NoApp(_))
    }

    pub fn exit_status(&self) -> ExitStatus {
        match self {
            CliError::Parse(e) => ExitStatus::from(e.exit_code()),
            CliError::NoSuchCommand(_) | CliError::NoApp(_) => ExitStatus::USAGE,
            CliError::Command(_) => ExitStatus::FAILURE,
        }
    }
}
