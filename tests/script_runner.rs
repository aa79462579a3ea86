// tests/script_runner.rs

use std::fs;
use std::path::{Path, PathBuf};

use hms_command_server::bridge::{JobBridge, ScriptError, execute_source, run_script};
use hms_command_server::engine::JobKind;
use hms_test_utils::fake_backend::ScriptedBackend;
use hms_test_utils::{init_tracing, session_with};

struct Fixture {
    _runtime: tokio::runtime::Runtime,
    dir: tempfile::TempDir,
    bridge: JobBridge,
}

impl Fixture {
    fn new(backend: ScriptedBackend) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");
        let bridge = JobBridge::new(session_with(backend), runtime.handle().clone());
        Self {
            _runtime: runtime,
            dir: tempfile::tempdir().expect("tempdir"),
            bridge,
        }
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, body).expect("write script");
        path
    }

    fn run(&self, path: &Path) -> i32 {
        run_script(&self.bridge, path)
    }
}

#[test]
fn missing_script_returns_minus_one() {
    init_tracing();
    let fx = Fixture::new(ScriptedBackend::new());
    assert_eq!(fx.run(&fx.dir.path().join("absent.script")), -1);
}

#[test]
fn directory_is_not_a_script() {
    let fx = Fixture::new(ScriptedBackend::new());
    assert_eq!(fx.run(fx.dir.path()), -1);
}

#[test]
fn complete_script_returns_zero() {
    let backend = ScriptedBackend::new();
    let fx = Fixture::new(backend.clone());
    let path = fx.script(
        "full.script",
        r#"
# Castro basin, two-day window
OpenProject("Castro", "/data/castro")
SetTimeWindow("2024-01-01T00:00", "2024-01-03T00:00")
CreateRun("Run 1")
CreateTrial(T1)
CreateForecast("F1")
ComputeRun("Run 1")
ComputeTrial("T1")
SelectTrial("T1")
ComputeForecast("F1")
"#,
    );

    assert_eq!(fx.run(&path), 0);
    assert_eq!(
        backend.calls(),
        vec![
            (JobKind::Run, "Run 1".to_string()),
            (JobKind::Trial, "T1".to_string()),
            (JobKind::Forecast, "F1".to_string()),
        ]
    );
}

#[test]
fn exit_status_becomes_the_script_status() {
    let backend = ScriptedBackend::new();
    let fx = Fixture::new(backend.clone());
    let path = fx.script(
        "exit.script",
        "OpenProject(\"P\")\nCreateRun(\"R\")\nExit(3)\nComputeRun(\"R\")\n",
    );

    assert_eq!(fx.run(&path), 3);
    assert!(backend.calls().is_empty(), "statements after Exit must not run");
}

#[test]
fn failed_compute_returns_minus_one() {
    let backend = ScriptedBackend::new().with_status(JobKind::Run, "R", 2);
    let fx = Fixture::new(backend.clone());
    let path = fx.script(
        "fail.script",
        "OpenProject(\"P\")\nCreateRun(\"R\")\nComputeRun(\"R\")\nExit(0)\n",
    );

    assert_eq!(fx.run(&path), -1);
    assert_eq!(backend.calls().len(), 1);
}

#[test]
fn deprecated_compute_still_runs() {
    let backend = ScriptedBackend::new();
    let fx = Fixture::new(backend.clone());
    let path = fx.script(
        "legacy.script",
        "OpenProject(\"P\")\nCreateRun(\"R\")\nCompute(\"R\")\n",
    );

    assert_eq!(fx.run(&path), 0);
    assert_eq!(backend.calls(), vec![(JobKind::Run, "R".to_string())]);
}

#[test]
fn unknown_function_returns_minus_one() {
    let fx = Fixture::new(ScriptedBackend::new());
    let path = fx.script("unknown.script", "OpenProject(\"P\")\nLaunchRockets()\n");
    assert_eq!(fx.run(&path), -1);
}

#[test]
fn source_errors_carry_their_line() {
    let fx = Fixture::new(ScriptedBackend::new());

    let err = execute_source(&fx.bridge, "\n\nCreateRun(\"a\", \"b\")\n").expect_err("arity");
    assert!(matches!(err, ScriptError::Arity { line: 3, got: 2, .. }), "{err}");

    let err = execute_source(&fx.bridge, "Exit(soon)").expect_err("exit status");
    assert!(matches!(err, ScriptError::ExitStatus { line: 1, .. }), "{err}");

    let err = execute_source(&fx.bridge, "SetTimeWindow(a, b)").expect_err("no project");
    assert!(matches!(err, ScriptError::Bridge { line: 1, .. }), "{err}");
}

#[test]
fn empty_script_succeeds() {
    let fx = Fixture::new(ScriptedBackend::new());
    assert_eq!(execute_source(&fx.bridge, "# nothing to do\n").expect("empty"), 0);
}
