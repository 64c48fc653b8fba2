//! cli::args
//!
//! Group-level options and how they bind into [`ScriptInfo`].
//!
//! # Options
//!
//! - `--app` / `-a` (`FLASK_APP`): application identifier or a path to a
//!   source file, which is turned into an identifier on the spot
//! - `--debug` / `--no-debug` (`FLASK_DEBUG`): debug override; unset when
//!   neither is given
//! - script-info options: extra options stored in [`ScriptInfo::data`]

use std::any::Any;
use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};
use serde_json::Value;

use crate::locate::{prepare_exec_for_file, NoAppError};
use crate::script_info::ScriptInfo;

pub const APP_ARG: &str = "app";
pub const DEBUG_ARG: &str = "debug";
pub const NO_DEBUG_ARG: &str = "no_debug";
pub const HELP_ARG: &str = "help";

/// `--app/-a <IMPORT>`.
pub fn app_option() -> Arg {
    Arg::new(APP_ARG)
        .short('a')
        .long("app")
        .env("FLASK_APP")
        .value_name("IMPORT")
        .help("The application to run (module, module:name or a path to a source file)")
}

/// `--debug` and `--no-debug`.
pub fn debug_options() -> [Arg; 2] {
    [
        Arg::new(DEBUG_ARG)
            .long("debug")
            .env("FLASK_DEBUG")
            .action(ArgAction::SetTrue)
            .value_parser(BoolishValueParser::new())
            .overrides_with(NO_DEBUG_ARG)
            .help("Enable debug mode"),
        Arg::new(NO_DEBUG_ARG)
            .long("no-debug")
            .action(ArgAction::SetTrue)
            .overrides_with(DEBUG_ARG)
            .help("Disable debug mode"),
    ]
}

/// Tri-state debug value: `None` when neither flag nor env var was given.
pub fn debug_value(matches: &ArgMatches) -> Option<bool> {
    if matches.get_flag(NO_DEBUG_ARG) {
        return Some(false);
    }
    match matches.value_source(DEBUG_ARG) {
        Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable) => {
            Some(matches.get_flag(DEBUG_ARG))
        }
        _ => None,
    }
}

/// Bind the `--app` value.
///
/// A value naming an existing file is resolved to an identifier (which
/// also puts its root on the search path). Anything else is taken as an
/// identifier and the current directory is made importable.
pub fn set_app_value(info: &mut ScriptInfo, value: Option<&str>) -> Result<(), NoAppError> {
    let Some(value) = value else {
        return Ok(());
    };

    let path = Path::new(value);
    let import_path = if path.is_file() {
        prepare_exec_for_file(info.registry(), path)?.to_string()
    } else {
        info.registry().ensure_search_path(Path::new("."));
        value.to_string()
    };
    tracing::debug!(import_path, "bound application import path");
    info.app_import_path = Some(import_path);
    Ok(())
}

/// An extra group option whose value is stored under `key` in
/// [`ScriptInfo::data`] before any command runs.
#[derive(Debug, Clone)]
pub struct ScriptInfoOption {
    arg: Arg,
    key: String,
}

impl ScriptInfoOption {
    pub fn new(arg: Arg, key: impl Into<String>) -> Self {
        Self {
            arg,
            key: key.into(),
        }
    }

    pub fn arg(&self) -> &Arg {
        &self.arg
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Copy the parsed value into `info.data` (`null` when absent).
    ///
    /// Booleans, integers, floats, strings and paths keep their parsed
    /// type; values of any other type are stored as the raw string.
    pub fn store(&self, info: &mut ScriptInfo, matches: &ArgMatches) {
        let value = parsed_value(matches, self.arg.get_id().as_str());
        info.data.insert(self.key.clone(), value);
    }
}

fn parsed_value(matches: &ArgMatches, id: &str) -> Value {
    let Some(raw) = matches.get_raw(id).and_then(|mut raw| raw.next()) else {
        return Value::Null;
    };
    typed::<bool>(matches, id)
        .or_else(|| typed::<String>(matches, id))
        .or_else(|| typed::<i64>(matches, id))
        .or_else(|| typed::<u64>(matches, id))
        .or_else(|| typed::<u32>(matches, id))
        .or_else(|| typed::<u16>(matches, id))
        .or_else(|| typed::<u8>(matches, id))
        .or_else(|| typed::<i32>(matches, id))
        .or_else(|| typed::<usize>(matches, id))
        .or_else(|| typed::<f64>(matches, id))
        .or_else(|| {
            matches
                .try_get_one::<PathBuf>(id)
                .ok()
                .flatten()
                .map(|p| Value::String(p.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| Value::String(raw.to_string_lossy().into_owned()))
}

fn typed<T>(matches: &ArgMatches, id: &str) -> Option<Value>
where
    T: Any + Clone + Send + Sync + Into<Value> + 'static,
{
    matches.try_get_one::<T>(id).ok().flatten().cloned().map(Into::into)
}
