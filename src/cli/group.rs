//! cli::group
//!
//! The command group that merges built-in and application commands.
//!
//! # Overview
//!
//! [`FlaskGroup`] owns the group-level options (`--app`, `--debug`, any
//! script-info options), its static commands (`run` and `shell` unless
//! disabled) and a [`Registry`] to locate applications in. Per invocation
//! it:
//!
//! 1. parses the group options and binds them into a fresh [`ScriptInfo`]
//! 2. resolves the command name: static commands first, then the loaded
//!    application's commands
//! 3. parses the command's own arguments, enters the application context
//!    if the command wants one, and calls it
//!
//! # Invariants
//!
//! - A static command shadows an application command of the same name
//! - Resolving a command never fails because the application cannot be
//!   found; configuration errors and load failures still surface
//! - Listing commands never fails; anything that goes wrong while loading
//!   the application just leaves its commands out
//! - Commands registered `without_appcontext` run with no context entered
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use flask_cli::cli::FlaskGroup;
//! use flask_cli::locate::Registry;
//! use flask_cli::script_info::ScriptInfo;
//!
//! let registry = Arc::new(Registry::new());
//! let group = FlaskGroup::new(Arc::clone(&registry));
//! let info = ScriptInfo::new(registry);
//! assert_eq!(group.list_commands(&info), vec!["run", "shell"]);
//! ```

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches};

use super::args::{self, ScriptInfoOption, APP_ARG, HELP_ARG};
use super::command::{Command, CommandRegistry, ExitStatus, Invocation};
use super::commands;
use super::error::CliError;
use crate::app::{Application, SharedApp};
use crate::locate::{NoAppError, Registry};
use crate::script_info::{AppFactory, ScriptInfo};

/// Construction options for [`FlaskGroup`].
#[derive(Clone)]
pub struct GroupOptions {
    /// Register the built-in `run` and `shell` commands.
    pub add_default_commands: bool,
    /// Offer `--app`. `None` means "only when no factory is configured".
    pub add_app_option: Option<bool>,
    /// Offer `--debug` / `--no-debug`.
    pub add_debug_option: bool,
    /// Build the application with this instead of locating it.
    pub create_app: Option<AppFactory>,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            add_default_commands: true,
            add_app_option: None,
            add_debug_option: true,
            create_app: None,
        }
    }
}

/// Command group aware of the application.
pub struct FlaskGroup {
    name: String,
    about: Option<String>,
    commands: CommandRegistry,
    registry: Arc<Registry>,
    create_app: Option<AppFactory>,
    add_app_option: bool,
    add_debug_option: bool,
    script_info_options: Vec<ScriptInfoOption>,
}

impl FlaskGroup {
    /// Group named `flask` with default options.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options("flask", registry, GroupOptions::default())
    }

    pub fn with_options(name: impl Into<String>, registry: Arc<Registry>, options: GroupOptions) -> Self {
        let add_app_option = options
            .add_app_option
            .unwrap_or(options.create_app.is_none());
        let mut group = Self {
            name: name.into(),
            about: None,
            commands: CommandRegistry::new(),
            registry,
            create_app: options.create_app,
            add_app_option,
            add_debug_option: options.add_debug_option,
            script_info_options: Vec::new(),
        };
        if options.add_default_commands {
            group.add_command(commands::run_command());
            group.add_command(commands::shell_command());
        }
        group
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// Builder form of [`FlaskGroup::add_command`].
    pub fn command(mut self, command: Command) -> Self {
        self.add_command(command);
        self
    }

    /// Register a static command.
    pub fn add_command(&mut self, command: Command) {
        self.commands.add_command(command);
    }

    /// Add a group option whose value is stored in [`ScriptInfo::data`]
    /// under `key`.
    pub fn script_info_option(mut self, arg: Arg, key: impl Into<String>) -> Self {
        self.script_info_options.push(ScriptInfoOption::new(arg, key));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Fresh [`ScriptInfo`] carrying this group's factory.
    pub fn make_script_info(&self) -> ScriptInfo {
        let mut info = ScriptInfo::new(Arc::clone(&self.registry));
        info.create_app = self.create_app.clone();
        info
    }

    /// Resolve `name`, static commands first.
    ///
    /// # Errors
    ///
    /// Anything from loading the application except "no application
    /// found", which resolves to `Ok(None)`.
    pub fn get_command(&self, info: &ScriptInfo, name: &str) -> Result<Option<Command>> {
        if let Some(command) = self.commands.get_command(name) {
            return Ok(Some(command));
        }

        let app = match info.load_app() {
            Ok(app) => app,
            Err(err) if is_not_found(&err) => {
                tracing::debug!(command = name, error = %err, "no application to resolve command from");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        Ok(app.cli().get_command(name))
    }

    /// Sorted union of static and application command names.
    pub fn list_commands(&self, info: &ScriptInfo) -> Vec<String> {
        let mut names: BTreeSet<String> = self.commands.list_commands().into_iter().collect();
        match info.load_app() {
            Ok(app) => names.extend(app.cli().list_commands()),
            Err(err) => {
                tracing::debug!(error = %err, "application commands unavailable");
            }
        }
        names.into_iter().collect()
    }

    /// Parse `args` for `command` and call it, inside the application
    /// context unless the command opted out.
    ///
    /// `--help` on the command prints its help and succeeds.
    pub fn invoke(
        &self,
        info: &Arc<ScriptInfo>,
        command: &Command,
        args: &[String],
    ) -> Result<ExitStatus, CliError> {
        let argv = std::iter::once(command.name().to_string()).chain(args.iter().cloned());
        let parsed = command
            .to_clap()
            .bin_name(format!("{} {}", self.name, command.name()))
            .try_get_matches_from(argv);
        let matches = match parsed {
            Ok(matches) => matches,
            Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                let _ = err.print();
                return Ok(ExitStatus::SUCCESS);
            }
            Err(err) => return Err(err.into()),
        };

        let ctx = info.conditional_context(command.with_appcontext())?;
        tracing::debug!(
            command = command.name(),
            with_appcontext = ctx.is_some(),
            "invoking command"
        );
        let invocation = Invocation {
            script_info: info,
            matches: &matches,
            app_context: ctx.as_ref(),
        };
        command.call(&invocation).map_err(CliError::from)
    }

    /// Parse the whole command line and run the selected command.
    ///
    /// Without a command (or with `--help`) the group help, including the
    /// application's commands, is printed.
    pub fn run<I, T>(&self, argv: I) -> Result<ExitStatus, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.root_command().try_get_matches_from(argv)?;
        let info = Arc::new(self.bind_options(&matches)?);

        match matches.subcommand() {
            Some((name, sub)) if !matches.get_flag(HELP_ARG) => {
                let args: Vec<String> = sub
                    .get_many::<String>("")
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default();
                let command = self
                    .get_command(&info, name)?
                    .ok_or_else(|| CliError::NoSuchCommand(name.to_string()))?;
                self.invoke(&info, &command, &args)
            }
            _ => {
                println!("{}", self.render_help(&info));
                Ok(ExitStatus::SUCCESS)
            }
        }
    }

    /// [`FlaskGroup::run`], with errors reported to stderr.
    pub fn main<I, T>(&self, argv: I) -> ExitCode
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.run(argv) {
            Ok(status) => status.into(),
            Err(err) => self.report(&err).into(),
        }
    }

    fn report(&self, err: &CliError) -> ExitStatus {
        match err {
            CliError::Parse(e) => {
                let _ = e.print();
            }
            CliError::Command(e) => {
                eprintln!("Error: {e:#}");
            }
            usage => {
                let name = &self.name;
                eprintln!(
                    "Usage: {name} [OPTIONS] COMMAND [ARGS]...\nTry '{name} --help' for help.\n\nError: {usage}"
                );
            }
        }
        err.exit_status()
    }

    fn bind_options(&self, matches: &ArgMatches) -> Result<ScriptInfo, NoAppError> {
        let mut info = self.make_script_info();
        for option in &self.script_info_options {
            option.store(&mut info, matches);
        }
        if self.add_app_option {
            args::set_app_value(&mut info, matches.get_one::<String>(APP_ARG).map(String::as_str))?;
        }
        if self.add_debug_option {
            info.debug = args::debug_value(matches);
        }
        Ok(info)
    }

    fn root_command(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone())
            .version(env!("CARGO_PKG_VERSION"))
            .disable_help_flag(true)
            .disable_help_subcommand(true)
            .allow_external_subcommands(true)
            .external_subcommand_value_parser(clap::value_parser!(String))
            .subcommand_value_name("COMMAND")
            .arg(
                Arg::new(HELP_ARG)
                    .long("help")
                    .action(ArgAction::SetTrue)
                    .help("Show this message and exit."),
            );
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        if self.add_app_option {
            cmd = cmd.arg(args::app_option());
        }
        if self.add_debug_option {
            cmd = cmd.args(args::debug_options());
        }
        for option in &self.script_info_options {
            cmd = cmd.arg(option.arg().clone());
        }
        cmd
    }

    /// Group help listing every resolvable command.
    pub fn render_help(&self, info: &ScriptInfo) -> String {
        let mut cmd = self.root_command();
        for name in self.list_commands(info) {
            let about = self
                .get_command(info, &name)
                .ok()
                .flatten()
                .and_then(|c| c.short_help().map(str::to_string));
            let mut sub = clap::Command::new(name);
            if let Some(about) = about {
                sub = sub.about(about);
            }
            cmd = cmd.subcommand(sub);
        }
        cmd.render_help().to_string()
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<NoAppError>()
        .is_some_and(NoAppError::is_not_found)
}

/// Factory adapter for [`GroupOptions::create_app`].
pub fn app_factory<F>(create_app: F) -> AppFactory
where
    F: Fn(&ScriptInfo) -> Result<SharedApp> + Send + Sync + 'static,
{
    Arc::new(create_app)
}
