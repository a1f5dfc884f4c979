use super::event_loop::{report_uncaught, LoopCore};
use super::ops;
use crate::engine::{EntryScript, Environment, ProcessedArgs, ScriptError};
use std::path::Path;
use std::rc::Rc;

const PRELUDE: &str = include_str!("prelude.js");

/// A `JsRuntime` with the host prelude installed
pub struct DenoEnvironment {
    core: Rc<LoopCore>,
    setup_error: Option<String>,
    stopped: bool,
}

impl DenoEnvironment {
    pub(crate) fn new(core: Rc<LoopCore>, args: &ProcessedArgs) -> Self {
        let setup_error = core
            .with_runtime(|runtime| {
                runtime
                    .execute_script("ext:jshost/prelude.js", PRELUDE)
                    .map_err(|err| err.to_string())?;

                let init = format!(
                    "globalThis.__jshost.init({}, {});",
                    js_string_array(&args.args),
                    js_string_array(&args.exec_args)
                );
                runtime
                    .execute_script("ext:jshost/init.js", init)
                    .map_err(|err| err.to_string())?;
                Ok::<_, String>(())
            })
            .unwrap_or_else(|| Err("no isolate registered".to_string()))
            .err();

        if let Some(err) = &setup_error {
            tracing::error!("prelude failed: {}", err);
        }

        Self {
            core,
            setup_error,
            stopped: false,
        }
    }

    /// Run a host hook. `Err` carries an error that was not a requested exit.
    fn call_hook(&mut self, name: &'static str, source: String) -> Option<Result<(), String>> {
        if self.stopped {
            return None;
        }
        self.core.with_runtime(|runtime| {
            match runtime.execute_script(name, source) {
                Ok(_) => Ok(()),
                Err(_) if ops::exit_state(runtime).requested => Ok(()),
                Err(err) => Err(err.to_string()),
            }
        })
    }

    fn exit_requested(&self) -> bool {
        self.core
            .with_runtime(|runtime| ops::exit_state(runtime).requested)
            .unwrap_or(true)
    }
}

fn js_string_array(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn module_bootstrap(path: &Path) -> Result<String, ScriptError> {
    let absolute = std::path::absolute(path)
        .map_err(|err| ScriptError::new(format!("{}: {}", path.display(), err)))?;
    let dir = absolute.parent().unwrap_or(Path::new("/"));
    let to_js = |p: &Path| serde_json::Value::String(p.to_string_lossy().into_owned()).to_string();
    Ok(format!(
        "globalThis.require = globalThis.__jshost.createRequire({}); require({});",
        to_js(dir),
        to_js(&absolute)
    ))
}

impl Environment for DenoEnvironment {
    fn load(&mut self, script: &EntryScript) -> Result<(), ScriptError> {
        if let Some(err) = &self.setup_error {
            return Err(ScriptError::new(err.clone()));
        }

        let (name, source) = match script {
            EntryScript::Inline { source, .. } => ("[eval]", source.clone()),
            EntryScript::Module(path) => ("[jshost:bootstrap]", module_bootstrap(path)?),
        };

        match self.call_hook(name, source) {
            Some(Ok(())) => Ok(()),
            Some(Err(message)) => Err(ScriptError::new(message)),
            None => Err(ScriptError::new("environment is not running")),
        }
    }

    fn emit_before_exit(&mut self) -> Option<()> {
        if self.exit_requested() {
            return None;
        }
        let emitted = self.call_hook(
            "[jshost:beforeExit]",
            "globalThis.__jshost.emitBeforeExit();".to_string(),
        )?;
        // Promise continuations of the listeners may schedule timers
        self.core
            .with_runtime(|runtime| runtime.v8_isolate().perform_microtask_checkpoint());
        match emitted {
            Ok(()) if !self.exit_requested() => Some(()),
            Ok(()) => None,
            Err(message) => {
                self.core.with_runtime(|runtime| report_uncaught(runtime, &message));
                None
            }
        }
    }

    fn emit_exit(&mut self) -> Option<i32> {
        let forced = self
            .core
            .with_runtime(|runtime| ops::exit_state(runtime))
            .filter(|state| state.requested)
            .and_then(|state| state.code);
        let source = match forced {
            Some(code) => format!("globalThis.__jshost.emitExit({});", code),
            None => "globalThis.__jshost.emitExit();".to_string(),
        };

        if let Err(message) = self.call_hook("[jshost:exit]", source)? {
            eprintln!("{}", message);
            return None;
        }
        self.core
            .with_runtime(|runtime| ops::exit_state(runtime).code)
            .flatten()
    }

    fn stop(&mut self) {
        self.stopped = true;
        tracing::debug!("environment stopped");
    }
}
