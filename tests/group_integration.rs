//! Integration tests for command resolution and dispatch.
//!
//! These use a tracked application that counts how often its context is
//! entered and torn down.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;

use flask_cli::app::{AppContext, Application, SharedApp, ShellContext};
use flask_cli::cli::{Command, CommandRegistry, ExitStatus, FlaskGroup};
use flask_cli::dispatch::LazyDispatcher;
use flask_cli::http::{Handler, Request, Response};
use flask_cli::locate::{NoAppError, Namespace, Registry};
use flask_cli::script_info::ScriptInfo;

// =============================================================================
// Test Fixtures
// =============================================================================

#[derive(Default)]
struct Counters {
    loads: AtomicUsize,
    entered: AtomicUsize,
    torn_down: AtomicUsize,
}

struct Tracked {
    debug: AtomicBool,
    cli: CommandRegistry,
    instance_path: PathBuf,
    counters: Arc<Counters>,
}

impl Handler for Tracked {
    fn call(&self, request: &Request) -> Result<Response> {
        Ok(Response::ok(format!("tracked {}", request.path)))
    }
}

impl Application for Tracked {
    fn import_name(&self) -> &str {
        "tracked"
    }

    fn instance_path(&self) -> &Path {
        &self.instance_path
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }

    fn cli(&self) -> &CommandRegistry {
        &self.cli
    }

    fn app_context(self: Arc<Self>) -> AppContext {
        self.counters.entered.fetch_add(1, Ordering::SeqCst);
        AppContext::push(self)
    }

    fn make_shell_context(&self) -> ShellContext {
        ShellContext::new()
    }

    fn teardown_appcontext(&self) {
        self.counters.torn_down.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry with a `tracked` namespace and a `broken` one whose loader fails.
fn fixture() -> (Arc<Registry>, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let seen = Arc::clone(&counters);

    let mut registry = Registry::new();
    registry.register("tracked", move || {
        seen.loads.fetch_add(1, Ordering::SeqCst);
        let mut cli = CommandRegistry::new();
        cli.add_command(Command::new("seed", |_| Ok(ExitStatus::SUCCESS)).about("Seed data"));
        cli.add_command(Command::new("shell", |_| Ok(ExitStatus::new(9))));
        let tracked = Tracked {
            debug: AtomicBool::new(false),
            cli,
            instance_path: PathBuf::from("/tmp/tracked"),
            counters: Arc::clone(&seen),
        };
        Ok(Namespace::new("tracked").app("app", Arc::new(tracked)))
    });
    registry.register("broken", || anyhow::bail!("boom while importing"));
    (Arc::new(registry), counters)
}

fn script_info(registry: &Arc<Registry>, path: Option<&str>) -> Arc<ScriptInfo> {
    let mut info = ScriptInfo::new(Arc::clone(registry));
    info.app_import_path = path.map(str::to_string);
    Arc::new(info)
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn listing_merges_and_sorts() {
    let (registry, _) = fixture();
    let group = FlaskGroup::new(Arc::clone(&registry));
    let info = script_info(&registry, Some("tracked"));
    assert_eq!(group.list_commands(&info), vec!["run", "seed", "shell"]);
}

#[test]
fn listing_with_failing_loader_shows_builtins() {
    let (registry, _) = fixture();
    let group = FlaskGroup::new(Arc::clone(&registry));
    let info = script_info(&registry, Some("broken"));
    assert_eq!(group.list_commands(&info), vec!["run", "shell"]);
}

#[test]
fn builtin_shell_shadows_app_shell() {
    let (registry, _) = fixture();
    let group = FlaskGroup::new(Arc::clone(&registry));
    let info = script_info(&registry, Some("tracked"));
    let shell = group.get_command(&info, "shell").unwrap().unwrap();
    assert_eq!(shell.short_help(), Some("Runs a shell in the app context."));
}

#[test]
fn only_not_found_is_swallowed() {
    let (registry, _) = fixture();
    let group = FlaskGroup::new(Arc::clone(&registry));

    let info = script_info(&registry, Some("tracked:nothing"));
    assert!(group.get_command(&info, "seed").unwrap().is_none());

    let info = script_info(&registry, Some("ghost"));
    let err = group.get_command(&info, "seed").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NoAppError>(),
        Some(NoAppError::ModuleNotFound { .. })
    ));

    let info = script_info(&registry, Some("broken"));
    let err = group.get_command(&info, "seed").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NoAppError>(),
        Some(NoAppError::ImportFailed { .. })
    ));

    let info = script_info(&registry, None);
    let err = group.get_command(&info, "seed").unwrap_err();
    assert!(err
        .downcast_ref::<NoAppError>()
        .is_some_and(NoAppError::is_configuration));
}

// =============================================================================
// Application context
// =============================================================================

#[test]
fn app_command_runs_in_one_context() {
    let (registry, counters) = fixture();
    let group = FlaskGroup::new(Arc::clone(&registry));
    let info = script_info(&registry, Some("tracked"));

    let seed = group.get_command(&info, "seed").unwrap().unwrap();
    let status = group.invoke(&info, &seed, &[]).unwrap();

    assert!(status.is_success());
    assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    assert_eq!(counters.entered.load(Ordering::SeqCst), 1);
    assert_eq!(counters.torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn without_appcontext_enters_no_context() {
    let (registry, counters) = fixture();
    let group = FlaskGroup::new(Arc::clone(&registry)).command(
        Command::new("check", |inv| {
            assert!(inv.app_context.is_none());
            Ok(ExitStatus::SUCCESS)
        })
        .without_appcontext(),
    );
    let info = script_info(&registry, Some("tracked"));

    let check = group.get_command(&info, "check").unwrap().unwrap();
    group.invoke(&info, &check, &[]).unwrap();

    assert_eq!(counters.entered.load(Ordering::SeqCst), 0);
    assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
}

#[test]
fn exit_status_is_propagated() {
    let (registry, _) = fixture();
    let group = FlaskGroup::new(Arc::clone(&registry))
        .command(Command::new("fail", |_| Ok(ExitStatus::new(3))));
    let status = group.run(["flask", "--app", "tracked", "fail"]).unwrap();
    assert_eq!(status.code(), 3);
}

// =============================================================================
// Dispatcher over ScriptInfo
// =============================================================================

#[test]
fn concurrent_requests_load_once() {
    let (registry, counters) = fixture();
    let info = script_info(&registry, Some("tracked"));
    let loader_info = Arc::clone(&info);
    let dispatcher: LazyDispatcher<SharedApp> =
        LazyDispatcher::new(move || loader_info.load_app(), false).unwrap();

    std::thread::scope(|s| {
        for i in 0..64 {
            let dispatcher = &dispatcher;
            s.spawn(move || {
                let resp = dispatcher.call(&Request::new("GET", &format!("/{i}"))).unwrap();
                assert_eq!(resp.body_text(), format!("tracked /{i}"));
            });
        }
    });

    assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    assert!(info.loaded_app().is_some());
}

#[test]
fn debug_override_reaches_dispatched_app() {
    let (registry, _) = fixture();
    let mut info = ScriptInfo::new(Arc::clone(&registry));
    info.app_import_path = Some("tracked".into());
    info.debug = Some(true);
    let info = Arc::new(info);

    let loader_info = Arc::clone(&info);
    let dispatcher = LazyDispatcher::new(move || loader_info.load_app(), true).unwrap();
    assert!(dispatcher.get().unwrap().debug());
}
