//! run command - Serve the application with the development server
//!
//! Runs outside the application context: the application is loaded
//! through a [`LazyDispatcher`] on the first request, or right away with
//! eager loading.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, FromArgMatches};

use crate::cli::command::{Command, ExitStatus, Invocation};
use crate::dispatch::LazyDispatcher;
use crate::serving::{self, ServeOptions};

const LONG_ABOUT: &str = "\
Runs a local development server for the application.

This local server is recommended for development purposes only. By default
it will not support any sort of concurrency at all to simplify debugging.
This can be changed with the --with-threads option which will enable basic
multithreading.

The reloader and debugger are by default enabled if debug mode is forced on
and disabled otherwise.";

/// Options of the `run` command.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// The interface to bind to.
    #[arg(short = 'h', long, env = "FLASK_RUN_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// The port to bind to.
    #[arg(short, long, env = "FLASK_RUN_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Enable the reloader. By default it is active if debug is enabled.
    #[arg(long, overrides_with = "no_reload")]
    pub reload: bool,

    /// Disable the reloader.
    #[arg(long, overrides_with = "reload")]
    pub no_reload: bool,

    /// Enable the debugger. By default it is active if debug is enabled.
    #[arg(long, overrides_with = "no_debugger")]
    pub debugger: bool,

    /// Disable the debugger.
    #[arg(long, overrides_with = "debugger")]
    pub no_debugger: bool,

    /// Load the application at startup. Default unless the reloader is on.
    #[arg(long, overrides_with = "lazy_loader")]
    pub eager_loading: bool,

    /// Load the application on the first request.
    #[arg(long, overrides_with = "eager_loading")]
    pub lazy_loader: bool,

    /// Enable multithreading.
    #[arg(long, overrides_with = "without_threads")]
    pub with_threads: bool,

    /// Disable multithreading.
    #[arg(long, overrides_with = "with_threads")]
    pub without_threads: bool,
}

/// Serving settings after defaults have been filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub reload: bool,
    pub debugger: bool,
    pub eager_loading: bool,
    pub threaded: bool,
}

impl RunArgs {
    /// Fill in unset switches from the debug override.
    pub fn settings(&self, debug: Option<bool>) -> RunSettings {
        let debug = debug.unwrap_or(false);
        let reload = switch(self.reload, self.no_reload).unwrap_or(debug);
        RunSettings {
            reload,
            debugger: switch(self.debugger, self.no_debugger).unwrap_or(debug),
            eager_loading: switch(self.eager_loading, self.lazy_loader).unwrap_or(!reload),
            threaded: switch(self.with_threads, self.without_threads).unwrap_or(false),
        }
    }
}

impl RunSettings {
    /// Whether this process should load the application before serving.
    ///
    /// The reloader's watcher process never serves, so it never loads.
    pub fn loads_eagerly(&self, from_reloader: bool) -> bool {
        self.eager_loading && (from_reloader || !self.reload)
    }
}

fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// The `run` command descriptor.
pub fn command() -> Command {
    Command::new("run", run)
        .about("Runs a development server.")
        .long_about(LONG_ABOUT)
        .args_from::<RunArgs>()
        .without_appcontext()
}

fn run(inv: &Invocation<'_>) -> Result<ExitStatus> {
    let args = RunArgs::from_arg_matches(inv.matches)?;
    let info = inv.script_info;
    let settings = args.settings(info.debug);
    tracing::debug!(?settings, host = %args.host, port = args.port, "run settings");

    let from_reloader = serving::is_running_from_reloader();
    let loader_info = Arc::clone(info);
    let dispatcher = LazyDispatcher::new(
        move || loader_info.load_app(),
        settings.loads_eagerly(from_reloader),
    )?;

    if !from_reloader {
        if let Some(path) = &info.app_import_path {
            println!(" * Serving Flask app \"{path}\"");
        }
        if let Some(debug) = info.debug {
            println!(" * Forcing debug {}", if debug { "on" } else { "off" });
        }
    }

    let options = ServeOptions {
        host: args.host,
        port: args.port,
        use_reloader: settings.reload,
        use_debugger: settings.debugger,
        threaded: settings.threaded,
        reloader_paths: info.registry().search_path(),
    };
    serving::run_simple(&options, Arc::new(dispatcher))?;
    Ok(ExitStatus::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunArgs {
        let matches = command()
            .to_clap()
            .try_get_matches_from(std::iter::once("run").chain(args.iter().copied()))
            .unwrap();
        RunArgs::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn defaults_follow_debug_override() {
        let args = parse(&[]);
        assert_eq!(args.port, 5000);

        let off = args.settings(None);
        assert_eq!(
            off,
            RunSettings {
                reload: false,
                debugger: false,
                eager_loading: true,
                threaded: false
            }
        );

        let on = args.settings(Some(true));
        assert!(on.reload);
        assert!(on.debugger);
        assert!(!on.eager_loading);
    }

    #[test]
    fn explicit_switches_win() {
        let args = parse(&["--no-reload", "--debugger", "--lazy-loader", "--with-threads"]);
        let s = args.settings(Some(true));
        assert!(!s.reload);
        assert!(s.debugger);
        assert!(!s.eager_loading);
        assert!(s.threaded);
    }

    #[test]
    fn later_switch_overrides_earlier() {
        let args = parse(&["--reload", "--no-reload"]);
        assert!(!args.settings(None).reload);
        let args = parse(&["--without-threads", "--with-threads"]);
        assert!(args.settings(None).threaded);
    }

    #[test]
    fn watcher_process_skips_eager_loading() {
        let s = parse(&["--reload", "--eager-loading"]).settings(None);
        assert!(s.eager_loading);
        assert!(!s.loads_eagerly(false));
        assert!(s.loads_eagerly(true));

        let s = parse(&["--no-reload", "--eager-loading"]).settings(None);
        assert!(s.loads_eagerly(false));

        let s = parse(&["--reload"]).settings(None);
        assert!(!s.loads_eagerly(true));
    }

    #[test]
    fn short_host_and_port() {
        let args = parse(&["-h", "0.0.0.0", "-p", "8000"]);
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8000);
    }

    #[test]
    fn runs_outside_app_context() {
        assert!(!command().with_appcontext());
    }
}
