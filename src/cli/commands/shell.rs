//! shell command - Inspect the application interactively
//!
//! Runs inside the application context and reads names from stdin,
//! printing their values from the application's shell context.
//! Dotted names (`config.DEBUG`) walk into objects and arrays.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use crate::app::{Application, ShellContext};
use crate::cli::command::{Command, ExitStatus, Invocation};

const PROMPT: &str = ">>> ";
const HELP: &str = "Type a name to print its value (dotted names walk into objects).\n\
Commands: dir, help, exit";

/// The `shell` command descriptor.
pub fn command() -> Command {
    Command::new("shell", shell)
        .about("Runs a shell in the app context.")
        .long_about(
            "Runs an interactive shell in the context of the application. The \
             application populates the namespace of this shell according to \
             its configuration.",
        )
}

fn shell(inv: &Invocation<'_>) -> Result<ExitStatus> {
    let app = match inv.app_context {
        Some(ctx) => ctx.app().clone(),
        None => inv.script_info.load_app()?,
    };
    let stdin = io::stdin();
    let stdout = io::stdout();
    interact(&banner(&*app), &app.make_shell_context(), stdin.lock(), stdout.lock())?;
    Ok(ExitStatus::SUCCESS)
}

/// Startup banner: tool version, platform, application and instance path.
pub fn banner(app: &dyn Application) -> String {
    format!(
        "flask {} on {}\nApp: {}{}\nInstance: {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        app.import_name(),
        if app.debug() { " [debug]" } else { "" },
        app.instance_path().display(),
    )
}

/// Run the read-print loop until `exit`, `quit` or end of input.
pub fn interact<R, W>(banner: &str, ctx: &ShellContext, mut input: R, mut output: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "{banner}")?;
    let mut line = String::new();
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }

        match line.trim() {
            "" => {}
            "exit" | "quit" | "exit()" | "quit()" => return Ok(()),
            "help" | "help()" => writeln!(output, "{HELP}")?,
            "dir" | "dir()" => {
                let names: Vec<&str> = ctx.keys().map(String::as_str).collect();
                writeln!(output, "{}", names.join("  "))?;
            }
            expr => match lookup(ctx, expr) {
                Some(value) => writeln!(output, "{}", serde_json::to_string_pretty(value)?)?,
                None => writeln!(output, "NameError: name '{expr}' is not defined")?,
            },
        }
    }
}

fn lookup<'a>(ctx: &'a ShellContext, expr: &str) -> Option<&'a serde_json::Value> {
    let mut parts = expr.split('.');
    let mut value = ctx.get(parts.next()?)?;
    for part in parts {
        value = match part.parse::<usize>() {
            Ok(index) if value.is_array() => value.get(index)?,
            _ => value.get(part)?,
        };
    }
    Some(value)
}
