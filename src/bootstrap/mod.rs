//! Runtime bootstrapper
//!
//! [`RuntimeEngine`] owns a [`Platform`] and runs exactly one instance on it:
//! loop, isolate, context, environment, drain, shutdown. All engine access
//! goes through the collaborator traits in [`crate::engine`].

pub mod drain;
pub mod loader;
pub mod shutdown;
pub mod state;

use crate::engine::{ArgsOutcome, Platform, ProcessedArgs, Scope, ScopeKind};
use crate::error::BootError;
use drain::DrainReport;
use state::BootState;

/// Lifecycle tracker for one instance
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: BootState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: BootState::Uninitialized,
        }
    }

    pub(crate) fn enter(&mut self, to: BootState) {
        if let Err(err) = self.state.advance(to) {
            tracing::error!(target: "lifecycle", "{}", err);
            debug_assert!(false, "{}", err);
        }
    }

    fn terminate(&mut self, code: i32) {
        self.enter(BootState::Terminated(code));
    }
}

/// The process-wide engine service.
///
/// Construct one per process and call [`RuntimeEngine::start`] once. A second
/// call returns [`BootError::AlreadyStarted`].
pub struct RuntimeEngine<P: Platform> {
    platform: P,
    lifecycle: Lifecycle,
    started: bool,
    last_drain: Option<DrainReport>,
}

impl<P: Platform> RuntimeEngine<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            lifecycle: Lifecycle::new(),
            started: false,
            last_drain: None,
        }
    }

    pub fn state(&self) -> BootState {
        self.lifecycle.state
    }

    /// Report from the drain loop, if the instance got that far
    pub fn drain_report(&self) -> Option<DrainReport> {
        self.last_drain
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run the instance to completion and return its exit code.
    ///
    /// Fatal initialization and load failures come back as `Err`; the
    /// instance has already been torn down as far as it got.
    ///
    /// # Panics
    ///
    /// Panics if the event loop cannot be closed after teardown.
    pub fn start(&mut self, args: Vec<String>) -> Result<i32, BootError> {
        if self.started {
            return Err(BootError::AlreadyStarted);
        }
        self.started = true;

        let program = args.first().cloned().unwrap_or_default();
        let processed = match self.platform.process_args(args) {
            ArgsOutcome::Run(processed) => processed,
            ArgsOutcome::Exit { code, errors } => {
                for error in errors {
                    eprintln!("{}: {}", program, error);
                }
                return Ok(code);
            }
        };

        if let Err(message) = self.platform.initialize() {
            self.lifecycle.terminate(1);
            return Err(BootError::PlatformInit(message));
        }
        self.lifecycle.enter(BootState::PlatformReady);

        let result = run_instance(
            &self.platform,
            &mut self.lifecycle,
            &mut self.last_drain,
            &processed,
        );
        if let Err(err) = &result {
            self.lifecycle.terminate(err.exit_code());
        }

        self.platform.shutdown();
        result
    }

    /// [`RuntimeEngine::start`], with fatal errors reported on stderr as
    /// `<argv0>: <message>` and turned into their exit code
    pub fn run(&mut self, args: Vec<String>) -> i32 {
        let program = args.first().cloned().unwrap_or_default();
        match self.start(args) {
            Ok(code) => code,
            Err(err) => {
                tracing::error!("{}", err);
                eprintln!("{}: {}", program, err);
                err.exit_code()
            }
        }
    }
}

fn run_instance<P: Platform>(
    platform: &P,
    lifecycle: &mut Lifecycle,
    last_drain: &mut Option<DrainReport>,
    args: &ProcessedArgs,
) -> Result<i32, BootError> {
    // A loop that failed to initialize is never closed
    let mut event_loop = platform.new_loop()?;
    let allocator = platform.new_allocator();
    let mut isolate = platform
        .new_isolate(&allocator, &mut event_loop)
        .ok_or(BootError::IsolateAlloc)?;
    lifecycle.enter(BootState::IsolateCreated);

    let outcome = {
        let mut locker = Scope::new(&mut isolate, ScopeKind::Locker);
        let mut entered = Scope::new(&mut *locker, ScopeKind::Isolate);
        let mut handles = Scope::new(&mut *entered, ScopeKind::Handle);

        match platform.new_context(&mut *handles) {
            None => Err(BootError::ContextCreate),
            Some(context) => {
                lifecycle.enter(BootState::ContextCreated);
                let mut context_scope = Scope::new(&mut *handles, ScopeKind::Context);
                let mut env = platform.create_environment(&mut *context_scope, &context, args);

                match loader::load(platform, &mut env, args) {
                    Err(err) => Err(err),
                    Ok(_) => {
                        lifecycle.enter(BootState::EnvironmentLoaded);
                        lifecycle.enter(BootState::Draining);
                        let report = {
                            let mut sealed = Scope::new(&mut *context_scope, ScopeKind::Seal);
                            drain::drain(platform, &mut event_loop, &mut *sealed, &mut env)
                        };
                        *last_drain = Some(report);

                        let code = shutdown::signal_exit(&mut env);
                        lifecycle.enter(BootState::ExitSignaled);
                        shutdown::stop_environment(env);
                        lifecycle.enter(BootState::Stopped);
                        Ok(code)
                    }
                }
            }
        }
    };

    match outcome {
        Ok(code) => {
            shutdown::release(platform, lifecycle, &mut event_loop, isolate, allocator);
            Ok(code)
        }
        Err(err) => {
            platform.unregister_isolate(&mut isolate);
            platform.dispose_isolate(isolate);
            Err(err)
        }
    }
}
