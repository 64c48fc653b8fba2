//! serving::reloader
//!
//! Restart the server when source files change.
//!
//! The watching process re-executes the current binary with the same
//! arguments and [`RUN_MAIN_ENV`](super::RUN_MAIN_ENV) set to `true`. The
//! child serves; the parent watches the given directories (not
//! recursively) and, after a debounced change, kills and respawns the
//! child. When the child exits on its own the parent returns.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};

use super::RUN_MAIN_ENV;

const DEBOUNCE: Duration = Duration::from_millis(500);
const POLL: Duration = Duration::from_millis(200);

/// Watch `paths` and keep a server child running until it exits by itself.
pub fn run_with_reloader(paths: &[PathBuf]) -> Result<()> {
    let (tx, rx) = mpsc::channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(DEBOUNCE, tx).context("failed to create file watcher")?;

    let watched = watch_roots(paths);
    for path in &watched {
        debouncer
            .watcher()
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", path.display()))?;
    }
    tracing::debug!(paths = ?watched, "watching for changes");

    loop {
        println!(" * Restarting with file watcher");
        let mut child = spawn_server()?;

        loop {
            if let Some(status) = child.try_wait()? {
                return finish(status);
            }
            match rx.recv_timeout(POLL) {
                Ok(Ok(events)) => {
                    if let Some(event) = events.first() {
                        println!(" * Detected change in {:?}, reloading", event.path);
                        tracing::info!(path = %event.path.display(), "reloading");
                    }
                    stop(&mut child);
                    break;
                }
                Ok(Err(e)) => tracing::warn!(error = %e, "file watcher error"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    stop(&mut child);
                    bail!("file watcher stopped");
                }
            }
        }
    }
}

/// Directories to watch; the current directory when none are given.
fn watch_roots(paths: &[PathBuf]) -> Vec<PathBuf> {
    let roots: Vec<PathBuf> = paths.iter().filter(|p| p.is_dir()).cloned().collect();
    if roots.is_empty() {
        vec![Path::new(".").to_path_buf()]
    } else {
        roots
    }
}

fn spawn_server() -> Result<Child> {
    let exe = std::env::current_exe().context("cannot locate current executable")?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    Command::new(&exe)
        .args(&args)
        .env(RUN_MAIN_ENV, "true")
        .spawn()
        .with_context(|| format!("failed to start {}", exe.display()))
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "server process already gone");
    }
    let _ = child.wait();
}

fn finish(status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        bail!("server process exited with {status}")
    }
}
