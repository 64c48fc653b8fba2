use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Arg;

use flask_cli::app::{current_app, App, Application, Config, SharedApp};
use flask_cli::cli::{self, Command, ExitStatus, FlaskGroup};
use flask_cli::http::Response;
use flask_cli::locate::{Namespace, Registry};

const ABOUT: &str = "\
A general utility script for web applications.

Provides commands from the application and the built-in run and shell \
commands. Select the application with --app or FLASK_APP; both take a \
module, module:name, or a path to a source file.";

fn main() -> ExitCode {
    cli::init_tracing();
    FlaskGroup::new(Arc::new(registry()))
        .about(ABOUT)
        .main(std::env::args_os())
}

/// Namespaces the bundled binary knows how to load.
fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register("hello", || Ok(Namespace::new("hello").app("app", hello_app()?)));
    registry.register("hello_factory", || {
        Ok(Namespace::new("hello_factory")
            .factory("create_app", hello_app)
            .value("__version__", env!("CARGO_PKG_VERSION")))
    });
    registry
}

fn hello_app() -> Result<SharedApp> {
    let config = Config::new();
    config.set("GREETING", "Hello");

    let app: SharedApp = App::builder("hello")
        .config(config)
        .route("/", |_, _| Ok(Response::ok("Hello World!")))
        .route("/config", |app, _| {
            Ok(Response::ok(serde_json::to_string_pretty(&app.config().snapshot())?))
        })
        .command(
            Command::new("greet", greet)
                .about("Greet someone.")
                .arg(Arg::new("name").default_value("World")),
        )
        .command(Command::new("routes", routes).about("Show the routes for the app."))
        .build();
    Ok(app)
}

fn greet(inv: &cli::Invocation<'_>) -> Result<ExitStatus> {
    let name = inv
        .matches
        .get_one::<String>("name")
        .map(String::as_str)
        .unwrap_or("World");
    let greeting = current_app()
        .and_then(|app| app.config().and_then(|c| c.get_str("GREETING")))
        .unwrap_or_else(|| "Hello".to_string());
    println!("{greeting}, {name}!");
    Ok(ExitStatus::SUCCESS)
}

fn routes(inv: &cli::Invocation<'_>) -> Result<ExitStatus> {
    for route in inv.script_info.load_app()?.route_paths() {
        println!("{route}");
    }
    Ok(ExitStatus::SUCCESS)
}
