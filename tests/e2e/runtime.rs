//! E2E tests running real JavaScript on the deno_core backend

use jshost::deno::{DenoPlatform, USAGE_EXIT_CODE};
use jshost::os::HostEnv;
use jshost::{BootError, RuntimeEngine};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Workspace with an empty config file, so no user config leaks in
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), "{}").unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, contents: &str) -> String {
        let path = self.path().join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn run(&self, args: &[&str]) -> Result<i32, BootError> {
        let config = self.path().join("config.json");
        let mut raw = vec![
            "jshost".to_string(),
            "--config".to_string(),
            config.to_string_lossy().into_owned(),
        ];
        raw.extend(args.iter().map(|a| a.to_string()));
        RuntimeEngine::new(DenoPlatform::new(HostEnv::default())).start(raw)
    }

    fn eval(&self, source: &str) -> Result<i32, BootError> {
        self.run(&["-e", source])
    }
}

#[test]
fn test_eval_exit_code() {
    let ws = Workspace::new();
    assert_eq!(ws.eval("process.exitCode = 3"), Ok(3));
    assert_eq!(ws.eval("1 + 1"), Ok(0));
}

#[test]
fn test_timer_runs_before_exit() {
    let ws = Workspace::new();
    let code = ws.eval("setTimeout(() => { process.exitCode = 5; }, 5);");
    assert_eq!(code, Ok(5));
}

#[test]
fn test_cleared_timer_never_fires() {
    let ws = Workspace::new();
    let code = ws.eval(
        "const id = setTimeout(() => { process.exitCode = 9; }, 1); clearTimeout(id);",
    );
    assert_eq!(code, Ok(0));
}

#[test]
fn test_cleared_long_timer_does_not_hold_the_loop() {
    let ws = Workspace::new();
    let started = Instant::now();
    let code = ws.eval(
        "const day = setTimeout(() => { process.exitCode = 9; }, 86400000);
         clearTimeout(day);",
    );
    assert_eq!(code, Ok(0));
    assert!(
        started.elapsed() < Duration::from_secs(30),
        "run took {:?}",
        started.elapsed()
    );
}

#[test]
fn test_clearing_one_timer_keeps_the_others() {
    let ws = Workspace::new();
    let code = ws.eval(
        "const a = setTimeout(() => { process.exitCode = 9; }, 1);
         setTimeout(() => { process.exitCode = (process.exitCode ?? 0) + 2; }, 5);
         clearTimeout(a);
         clearTimeout(a);",
    );
    assert_eq!(code, Ok(2));
}

/// Work that a beforeExit listener schedules, even work that is ready at
/// once, is drained and followed by a second beforeExit
#[test]
fn test_ready_work_from_before_exit_gets_another_signal() {
    let ws = Workspace::new();
    let code = ws.eval(
        "let signals = 0;
         process.on('beforeExit', () => {
           signals += 1;
           if (signals === 1) setTimeout(() => {}, 0);
           process.exitCode = signals;
         });",
    );
    assert_eq!(code, Ok(2));

    let code = ws.eval(
        "let signals = 0;
         process.on('beforeExit', () => {
           signals += 1;
           if (signals === 1) Promise.resolve().then(() => setTimeout(() => {}, 0));
           process.exitCode = signals;
         });",
    );
    assert_eq!(code, Ok(2));
}

#[test]
fn test_before_exit_can_reschedule() {
    let ws = Workspace::new();
    let code = ws.eval(
        "let signals = 0;
         process.on('beforeExit', () => {
           signals += 1;
           if (signals < 3) setTimeout(() => {}, 1);
           else process.exitCode = signals;
         });",
    );
    assert_eq!(code, Ok(3));
}

#[test]
fn test_process_exit_from_timer() {
    let ws = Workspace::new();
    let code = ws.eval(
        "process.on('exit', (c) => { globalThis.seen = c; });
         setTimeout(() => process.exit(4), 1);
         setTimeout(() => { process.exitCode = 8; }, 50);",
    );
    assert_eq!(code, Ok(4));
}

#[test]
fn test_exit_listener_sets_code() {
    let ws = Workspace::new();
    let code = ws.eval("process.on('exit', () => { process.exitCode = 6; });");
    assert_eq!(code, Ok(6));
}

#[test]
fn test_uncaught_timer_error_exits_with_one() {
    let ws = Workspace::new();
    let code = ws.eval("setTimeout(() => { throw new Error('late'); }, 1);");
    assert_eq!(code, Ok(1));
}

#[test]
fn test_throw_during_load_is_fatal() {
    let ws = Workspace::new();
    let err = ws.eval("throw new TypeError('early')").unwrap_err();
    assert!(matches!(err, BootError::ScriptLoad { .. }));
    assert!(err.to_string().contains("early"), "{}", err);
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_require_relative_module_and_json() {
    let ws = Workspace::new();
    ws.write("lib.js", "exports.add = (a, b) => a + b;");
    ws.write("data.json", r#"{ "a": 2, "b": 5 }"#);
    let main = ws.write(
        "main.js",
        "const { add } = require('./lib');
         const data = require('./data.json');
         process.exitCode = add(data.a, data.b);",
    );
    assert_eq!(ws.run(&[main.as_str()]), Ok(7));
}

#[test]
fn test_script_arguments_reach_argv() {
    let ws = Workspace::new();
    let main = ws.write(
        "main.js",
        "process.exitCode = process.argv.length * 10 + process.execArgv.length;",
    );
    // argv: program, script, two arguments; execArgv: --config <file>
    assert_eq!(ws.run(&[main.as_str(), "one", "--two"]), Ok(42));
}

#[test]
fn test_missing_entry_module() {
    let ws = Workspace::new();
    let missing = ws.path().join("nope.js");
    let err = ws.run(&[missing.to_str().unwrap()]).unwrap_err();
    assert!(matches!(err, BootError::ScriptLoad { .. }));
}

#[test]
fn test_invalid_host_option() {
    let ws = Workspace::new();
    assert_eq!(ws.run(&["--platform-threads", "many"]), Ok(USAGE_EXIT_CODE));
}
