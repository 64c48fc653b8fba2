//! cli::commands
//!
//! Built-in commands registered on every group unless disabled.

pub mod run;
pub mod shell;

pub use run::RunArgs;

use super::command::Command;

/// `run`: serve the application with the development server.
pub fn run_command() -> Command {
    run::command()
}

/// `shell`: interactive inspector inside the application context.
pub fn shell_command() -> Command {
    shell::command()
}
