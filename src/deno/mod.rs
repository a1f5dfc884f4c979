//! deno_core backend
//!
//! Implements the engine collaborators on top of `deno_core`: the V8 platform
//! is created once per process, the event loop is a current-thread tokio
//! runtime polling the `JsRuntime`, and script-visible behavior (`process`,
//! timers, `require`) comes from a small JS prelude backed by host ops.

pub mod cli;
mod environment;
mod event_loop;
mod ops;
pub mod resolve;

pub use environment::DenoEnvironment;
pub use event_loop::DenoLoop;

use crate::config::HostConfig;
use crate::engine::{
    ArgsOutcome, EntryScript, IsolateFinishedCallback, IsolateScopes, LoopInitError, Platform,
    ProcessedArgs, ScopeKind,
};
use crate::os::HostEnv;
use deno_core::{v8, JsRuntime, RuntimeOptions};
use event_loop::LoopCore;
use once_cell::sync::OnceCell;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::Arc;

// V8 cannot be re-initialized after disposal, so the platform lives for the
// rest of the process once created.
static V8_PLATFORM: OnceCell<v8::SharedRef<v8::Platform>> = OnceCell::new();

/// Exit code for invalid host options
pub const USAGE_EXIT_CODE: i32 = 2;

pub struct DenoPlatform {
    env: HostEnv,
    config: HostConfig,
    platform: Option<v8::SharedRef<v8::Platform>>,
}

impl DenoPlatform {
    pub fn new(env: HostEnv) -> Self {
        Self {
            env,
            config: HostConfig::default(),
            platform: None,
        }
    }

    /// Effective configuration once arguments have been processed
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    fn load_config(&self, host: &cli::HostArgs) -> Result<HostConfig, String> {
        let mut config = HostConfig::discover(
            host.config.as_deref(),
            self.env.config_path.clone(),
            HostConfig::default_path(),
        )
        .map_err(|err| err.to_string())?;
        config.apply(&host.overrides());
        config.validate().map_err(|err| err.to_string())?;
        Ok(config)
    }
}

pub struct DenoIsolate {
    core: Rc<LoopCore>,
    scopes: Vec<ScopeKind>,
    finished: Vec<IsolateFinishedCallback>,
    unregistered: Option<JsRuntime>,
}

impl IsolateScopes for DenoIsolate {
    // deno_core opens V8 handle scopes per call; these hooks only track the
    // nesting the bootstrapper holds around those calls.
    fn enter_scope(&mut self, kind: ScopeKind) {
        tracing::trace!("enter {:?} scope", kind);
        self.scopes.push(kind);
    }

    fn exit_scope(&mut self, kind: ScopeKind) {
        let top = self.scopes.pop();
        debug_assert_eq!(top, Some(kind), "scopes released out of order");
        tracing::trace!("exit {:?} scope", kind);
    }
}

pub struct DenoContext {
    _context: v8::Global<v8::Context>,
}

impl Platform for DenoPlatform {
    type Loop = DenoLoop;
    type Allocator = v8::SharedRef<v8::Allocator>;
    type Isolate = DenoIsolate;
    type Context = DenoContext;
    type Environment = DenoEnvironment;

    fn process_args(&mut self, args: Vec<String>) -> ArgsOutcome {
        let (host, mut processed) = match cli::parse(&args) {
            cli::Parsed::Run { host, processed } => (host, processed),
            cli::Parsed::Info(text) => {
                print!("{}", text);
                return ArgsOutcome::Exit {
                    code: 0,
                    errors: Vec::new(),
                };
            }
            cli::Parsed::Invalid(message) => {
                return ArgsOutcome::Exit {
                    code: USAGE_EXIT_CODE,
                    errors: vec![message],
                }
            }
        };

        self.config = match self.load_config(&host) {
            Ok(config) => config,
            Err(message) => {
                return ArgsOutcome::Exit {
                    code: USAGE_EXIT_CODE,
                    errors: vec![message],
                }
            }
        };

        // A configured entry module takes the script slot; positionals become its arguments
        if self.config.bootstrap.is_none() {
            if let Some(entry) = &self.config.entry {
                processed
                    .args
                    .insert(1, entry.to_string_lossy().into_owned());
            }
        }

        ArgsOutcome::Run(processed)
    }

    fn initialize(&mut self) -> Result<(), String> {
        let threads = u32::try_from(self.config.platform_threads).map_err(|e| e.to_string())?;
        let flags = self.config.v8_flags.clone();

        let platform = V8_PLATFORM.get_or_init(|| {
            if let Some(flags) = flags {
                let mut argv = vec!["jshost".to_string()];
                argv.extend(flags.split_whitespace().map(str::to_string));
                let rejected = deno_core::v8_set_flags(argv);
                if rejected.len() > 1 {
                    tracing::warn!("unrecognized V8 flags: {}", rejected[1..].join(" "));
                }
            }
            tracing::debug!(threads, "creating V8 platform");
            v8::new_default_platform(threads, false).make_shared()
        });
        self.platform = Some(platform.clone());
        Ok(())
    }

    fn shutdown(&mut self) {
        // The process-wide platform stays alive; only this handle is released
        self.platform = None;
    }

    fn entry_script(&self, args: &ProcessedArgs) -> Option<EntryScript> {
        if let Some(source) = &self.config.bootstrap {
            return Some(EntryScript::Inline {
                name: "[eval]".to_string(),
                source: source.clone(),
            });
        }
        args.args.get(1).map(|path| EntryScript::Module(path.into()))
    }

    fn new_loop(&self) -> Result<DenoLoop, LoopInitError> {
        Ok(DenoLoop {
            core: LoopCore::new()?,
        })
    }

    fn new_allocator(&self) -> Arc<v8::SharedRef<v8::Allocator>> {
        Arc::new(v8::new_default_allocator().make_shared())
    }

    fn new_isolate(
        &self,
        allocator: &Arc<v8::SharedRef<v8::Allocator>>,
        event_loop: &mut DenoLoop,
    ) -> Option<DenoIsolate> {
        let mut create_params =
            v8::CreateParams::default().array_buffer_allocator((**allocator).clone());
        if let Some((initial, max)) = self.config.heap_limits() {
            create_params = create_params.heap_limits(initial, max);
        }

        let options = RuntimeOptions {
            extensions: vec![ops::extension()],
            create_params: Some(create_params),
            v8_platform: self.platform.clone(),
            ..Default::default()
        };

        let core = event_loop.core.clone();
        let created = {
            let _guard = core.tokio.enter();
            std::panic::catch_unwind(AssertUnwindSafe(|| JsRuntime::new(options)))
        };
        let runtime = match created {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::error!("JsRuntime creation panicked");
                return None;
            }
        };

        *core.runtime.borrow_mut() = Some(runtime);
        Some(DenoIsolate {
            core,
            scopes: Vec::new(),
            finished: Vec::new(),
            unregistered: None,
        })
    }

    fn new_context(&self, isolate: &mut DenoIsolate) -> Option<DenoContext> {
        isolate
            .core
            .with_runtime(|runtime| runtime.main_context())
            .map(|context| DenoContext { _context: context })
    }

    fn create_environment(
        &self,
        isolate: &mut DenoIsolate,
        _context: &DenoContext,
        args: &ProcessedArgs,
    ) -> DenoEnvironment {
        DenoEnvironment::new(isolate.core.clone(), args)
    }

    fn drain_tasks(&self, isolate: &mut DenoIsolate) {
        let Some(platform) = &self.platform else {
            return;
        };
        isolate.core.with_runtime(|runtime| {
            while v8::Platform::pump_message_loop(platform, runtime.v8_isolate(), false) {}
        });
    }

    fn add_isolate_finished_callback(
        &self,
        isolate: &mut DenoIsolate,
        callback: IsolateFinishedCallback,
    ) {
        isolate.finished.push(callback);
    }

    fn unregister_isolate(&self, isolate: &mut DenoIsolate) {
        isolate.unregistered = isolate.core.runtime.borrow_mut().take();
    }

    fn dispose_isolate(&self, mut isolate: DenoIsolate) {
        if let Some(runtime) = isolate.unregistered.take() {
            let _guard = isolate.core.tokio.enter();
            drop(runtime);
        }
        isolate
            .core
            .teardown
            .borrow_mut()
            .append(&mut isolate.finished);
        tracing::debug!("isolate disposed");
    }
}
