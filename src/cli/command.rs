//! cli::command
//!
//! Command descriptors and the plain command registry.
//!
//! # Overview
//!
//! A [`Command`] is a name, help text, clap arguments, a callback and a
//! `with_appcontext` flag that is fixed at registration time. Commands
//! opting out of the application context (like `run`) are never wrapped in
//! one by [`crate::cli::FlaskGroup`].
//!
//! [`CommandRegistry`] is what applications expose through
//! [`crate::app::Application::cli`]; the group keeps one for its static
//! commands as well.
//!
//! # Example
//!
//! ```
//! use flask_cli::cli::{Command, ExitStatus};
//! use clap::Arg;
//!
//! let cmd = Command::new("greet", |inv| {
//!     let name = inv.matches.get_one::<String>("name").cloned().unwrap_or_default();
//!     println!("hello {name}");
//!     Ok(ExitStatus::SUCCESS)
//! })
//! .about("Say hello")
//! .arg(Arg::new("name").required(true));
//!
//! assert!(cmd.with_appcontext());
//! assert!(!cmd.clone().without_appcontext().with_appcontext());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches};

use crate::app::AppContext;
use crate::script_info::ScriptInfo;

/// Exit status a command reports back to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(u8);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    pub const FAILURE: ExitStatus = ExitStatus(1);
    /// Bad invocation: unknown command, missing application, bad options.
    pub const USAGE: ExitStatus = ExitStatus(2);

    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitStatus {
    fn from(code: i32) -> Self {
        Self(u8::try_from(code).unwrap_or(1))
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.0)
    }
}

/// Everything a command callback gets to see.
pub struct Invocation<'a> {
    /// Per-invocation configuration and application loader.
    pub script_info: &'a Arc<ScriptInfo>,
    /// Parsed command arguments.
    pub matches: &'a ArgMatches,
    /// Active application context, unless the command opted out.
    pub app_context: Option<&'a AppContext>,
}

/// Command callback.
pub type Callback = Arc<dyn Fn(&Invocation<'_>) -> Result<ExitStatus> + Send + Sync>;

/// A registered command.
#[derive(Clone)]
pub struct Command {
    name: String,
    about: Option<String>,
    long_about: Option<String>,
    args: Vec<Arg>,
    with_appcontext: bool,
    callback: Callback,
}

impl Command {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<ExitStatus> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            about: None,
            long_about: None,
            args: Vec::new(),
            with_appcontext: true,
            callback: Arc::new(callback),
        }
    }

    /// Short help shown in command listings.
    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn long_about(mut self, long_about: impl Into<String>) -> Self {
        self.long_about = Some(long_about.into());
        self
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// Take the arguments declared by a `clap::Args` derive.
    pub fn args_from<A: clap::Args>(mut self) -> Self {
        let cmd = A::augment_args(clap::Command::new(self.name.clone()));
        self.args.extend(cmd.get_arguments().cloned());
        self
    }

    /// Run without an application context.
    pub fn without_appcontext(mut self) -> Self {
        self.with_appcontext = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_help(&self) -> Option<&str> {
        self.about.as_deref()
    }

    pub fn with_appcontext(&self) -> bool {
        self.with_appcontext
    }

    /// clap definition used to parse this command's arguments.
    ///
    /// Only `--help` is registered for help so that `-h` stays free for
    /// command options.
    pub fn to_clap(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone())
            .disable_help_flag(true)
            .arg(
                Arg::new("help")
                    .long("help")
                    .action(ArgAction::Help)
                    .help("Show this message and exit."),
            )
            .args(self.args.iter().cloned());
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        if let Some(long_about) = &self.long_about {
            cmd = cmd.long_about(long_about.clone());
        }
        cmd
    }

    /// Run the callback.
    pub fn call(&self, invocation: &Invocation<'_>) -> Result<ExitStatus> {
        (self.callback)(invocation)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("about", &self.about)
            .field("with_appcontext", &self.with_appcontext)
            .finish_non_exhaustive()
    }
}

/// Name-keyed set of commands.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `command`, replacing any command with the same name.
    pub fn add_command(&mut self, command: Command) {
        self.commands.insert(command.name.clone(), command);
    }

    pub fn get_command(&self, name: &str) -> Option<Command> {
        self.commands.get(name).cloned()
    }

    /// Command names in sorted order.
    pub fn list_commands(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(clap::Args, Debug)]
    struct PortArgs {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    }

    #[test]
    fn exit_status_from_i32() {
        assert_eq!(ExitStatus::from(0), ExitStatus::SUCCESS);
        assert_eq!(ExitStatus::from(2), ExitStatus::USAGE);
        assert_eq!(ExitStatus::from(-1), ExitStatus::FAILURE);
        assert_eq!(ExitStatus::from(300), ExitStatus::FAILURE);
    }

    #[test]
    fn to_clap_leaves_short_h_free() {
        let cmd = Command::new("serve", |_| Ok(ExitStatus::SUCCESS))
            .arg(Arg::new("host").short('h').long("host"));
        let matches = cmd
            .to_clap()
            .try_get_matches_from(["serve", "-h", "0.0.0.0"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("host").unwrap(), "0.0.0.0");
    }

    #[test]
    fn help_flag_reports_display_help() {
        let cmd = Command::new("serve", |_| Ok(ExitStatus::SUCCESS)).about("Serve");
        let err = cmd
            .to_clap()
            .try_get_matches_from(["serve", "--help"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn args_from_derive() {
        let cmd = Command::new("serve", |_| Ok(ExitStatus::SUCCESS)).args_from::<PortArgs>();
        let matches = cmd
            .to_clap()
            .try_get_matches_from(["serve", "--port", "9000"])
            .unwrap();
        assert_eq!(*matches.get_one::<u16>("port").unwrap(), 9000);
    }

    #[test]
    fn registry_replaces_and_sorts() {
        let mut reg = CommandRegistry::new();
        reg.add_command(Command::new("zeta", |_| Ok(ExitStatus::SUCCESS)));
        reg.add_command(Command::new("alpha", |_| Ok(ExitStatus::FAILURE)));
        reg.add_command(Command::new("alpha", |_| Ok(ExitStatus::SUCCESS)).about("second"));
        assert_eq!(reg.list_commands(), vec!["alpha", "zeta"]);
        assert_eq!(reg.get_command("alpha").unwrap().short_help(), Some("second"));
        assert!(reg.get_command("missing").is_none());
    }
}
