//! Deterministic scripted engine
//!
//! A complete in-process implementation of the engine collaborators whose
//! "script" is a list of [`Step`]s instead of JavaScript source. Timers,
//! platform tasks, lifecycle listeners, `process.exit` and leaked handles are
//! modelled closely enough to drive every path of the bootstrapper, and every
//! collaborator call is appended to a shared [`Journal`].
//!
//! Failures are injected through the builder methods on [`ScriptedPlatform`].

use super::{
    ArgsOutcome, EntryScript, Environment, EventLoop, IsolateFinishedCallback, IsolateScopes,
    LoopCloseError, LoopInitError, Platform, ProcessedArgs, RunMode, ScopeKind, ScriptError,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// One instruction of a scripted body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `process.exitCode = n`
    SetExitCode(i32),
    /// Throw an exception with this message
    Throw(String),
    /// Schedule `then` to run once `turns` loop passes have completed
    SetTimeout { turns: u32, then: Vec<Step> },
    /// Post a background platform task bound to the isolate
    PostTask(Vec<Step>),
    /// Register a `beforeExit` listener
    OnBeforeExit(Vec<Step>),
    /// Register a `beforeExit` listener that runs only for the next emission
    OnceBeforeExit(Vec<Step>),
    /// Register an `exit` listener
    OnExit(Vec<Step>),
    /// Make every later `beforeExit` emission fail at the engine level
    FailBeforeExit,
    /// Make the `exit` emission fail at the engine level, yielding no code
    FailExit,
    /// `process.exit(n)`
    Exit(i32),
    /// Open a handle that never closes and does not keep the loop alive
    OpenUnrefHandle,
    /// Append a marker to the journal
    Log(String),
}

/// A collaborator call or script-visible effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ArgsProcessed,
    PlatformInitialized,
    PlatformShutdown,
    LoopCreated,
    AllocatorCreated,
    IsolateCreated,
    ScopeEntered(ScopeKind),
    ScopeExited(ScopeKind),
    ContextCreated,
    EnvironmentCreated,
    ScriptLoaded,
    Log(String),
    LoopRun(RunMode),
    TimerFired,
    TasksDrained(usize),
    Uncaught(String),
    BeforeExit,
    Exit,
    EnvironmentStopped,
    EnvironmentFreed,
    FinishedCallbackRegistered,
    IsolateUnregistered,
    IsolateDisposed,
    FinishedCallbackFired,
    LoopClosed,
}

/// Shared, append-only record of [`Event`]s
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.0.borrow().contains(event)
    }

    pub fn count(&self, event: &Event) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }

    /// Index of the first occurrence of `event`
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == event)
    }
}

/// Injected failures and timing knobs
#[derive(Debug, Clone)]
struct Behavior {
    reject_args: Option<(i32, Vec<String>)>,
    platform_init_error: Option<String>,
    loop_init_error: Option<String>,
    fail_isolate: bool,
    fail_context: bool,
    teardown_turns: u32,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            reject_args: None,
            platform_init_error: None,
            loop_init_error: None,
            fail_isolate: false,
            fail_context: false,
            teardown_turns: 1,
        }
    }
}

struct Timer {
    remaining: u32,
    then: Vec<Step>,
}

/// Why a step sequence stopped early
enum Interrupt {
    Threw(String),
    Exited,
}

/// Script-visible state shared by the loop, the isolate and the environment
#[derive(Default)]
struct World {
    timers: Vec<Timer>,
    tasks: Vec<Vec<Step>>,
    before_exit_listeners: Vec<(Vec<Step>, bool)>,
    exit_listeners: Vec<Vec<Step>>,
    before_exit_broken: bool,
    exit_broken: bool,
    exit_listener_threw: bool,
    exit_code: Option<i32>,
    exiting: bool,
    exit_emitted: bool,
    stopped: bool,
    unref_handles: usize,
    isolate_live: bool,
    finished_callbacks: Vec<IsolateFinishedCallback>,
    teardown: Option<(u32, Vec<IsolateFinishedCallback>)>,
}

type SharedWorld = Rc<RefCell<World>>;

fn exec(world: &SharedWorld, journal: &Journal, steps: &[Step]) -> Result<(), Interrupt> {
    for step in steps {
        match step {
            Step::SetExitCode(code) => world.borrow_mut().exit_code = Some(*code),
            Step::Throw(message) => return Err(Interrupt::Threw(message.clone())),
            Step::SetTimeout { turns, then } => world.borrow_mut().timers.push(Timer {
                remaining: *turns,
                then: then.clone(),
            }),
            Step::PostTask(task) => world.borrow_mut().tasks.push(task.clone()),
            Step::OnBeforeExit(listener) => world
                .borrow_mut()
                .before_exit_listeners
                .push((listener.clone(), false)),
            Step::OnceBeforeExit(listener) => world
                .borrow_mut()
                .before_exit_listeners
                .push((listener.clone(), true)),
            Step::OnExit(listener) => world.borrow_mut().exit_listeners.push(listener.clone()),
            Step::FailBeforeExit => world.borrow_mut().before_exit_broken = true,
            Step::FailExit => world.borrow_mut().exit_broken = true,
            Step::Exit(code) => {
                {
                    let mut w = world.borrow_mut();
                    w.exit_code = Some(*code);
                    w.exiting = true;
                }
                emit_exit_listeners(world, journal);
                return Err(Interrupt::Exited);
            }
            Step::OpenUnrefHandle => world.borrow_mut().unref_handles += 1,
            Step::Log(message) => journal.push(Event::Log(message.clone())),
        }
    }
    Ok(())
}

/// Run a callback outside of load; an uncaught exception ends the process with 1
fn exec_callback(world: &SharedWorld, journal: &Journal, steps: &[Step]) {
    if let Err(Interrupt::Threw(message)) = exec(world, journal, steps) {
        journal.push(Event::Uncaught(message));
        {
            let mut w = world.borrow_mut();
            w.exit_code = Some(1);
            w.exiting = true;
        }
        emit_exit_listeners(world, journal);
    }
}

fn emit_exit_listeners(world: &SharedWorld, journal: &Journal) {
    let listeners = {
        let mut w = world.borrow_mut();
        if w.exit_emitted {
            return;
        }
        w.exit_emitted = true;
        w.exit_listeners.clone()
    };
    journal.push(Event::Exit);
    for listener in listeners {
        // A throwing exit listener leaves the exit signal without a code
        if let Err(Interrupt::Threw(message)) = exec(world, journal, &listener) {
            journal.push(Event::Uncaught(message));
            world.borrow_mut().exit_listener_threw = true;
            return;
        }
    }
}

/// Scripted [`Platform`]
pub struct ScriptedPlatform {
    body: Vec<Step>,
    behavior: Behavior,
    journal: Journal,
    world: SharedWorld,
}

impl ScriptedPlatform {
    pub fn new(body: Vec<Step>) -> Self {
        Self {
            body,
            behavior: Behavior::default(),
            journal: Journal::default(),
            world: SharedWorld::default(),
        }
    }

    /// Handle to the shared journal; stays valid after the platform is consumed
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn reject_args(mut self, code: i32, errors: Vec<String>) -> Self {
        self.behavior.reject_args = Some((code, errors));
        self
    }

    pub fn fail_platform_init(mut self, message: impl Into<String>) -> Self {
        self.behavior.platform_init_error = Some(message.into());
        self
    }

    pub fn fail_loop_init(mut self, name: impl Into<String>) -> Self {
        self.behavior.loop_init_error = Some(name.into());
        self
    }

    pub fn fail_isolate(mut self) -> Self {
        self.behavior.fail_isolate = true;
        self
    }

    pub fn fail_context(mut self) -> Self {
        self.behavior.fail_context = true;
        self
    }

    /// Number of `Once` passes before the isolate-finished callback fires
    pub fn teardown_turns(mut self, turns: u32) -> Self {
        self.behavior.teardown_turns = turns.max(1);
        self
    }
}

pub struct ScriptedLoop {
    world: SharedWorld,
    journal: Journal,
}

impl ScriptedLoop {
    fn run_pass(&mut self) {
        let halted = {
            let w = self.world.borrow();
            w.exiting || w.stopped
        };
        if halted {
            return;
        }

        let due = {
            let mut w = self.world.borrow_mut();
            let (due, pending): (Vec<Timer>, Vec<Timer>) =
                w.timers.drain(..).partition(|t| t.remaining == 0);
            w.timers = pending
                .into_iter()
                .map(|mut t| {
                    t.remaining -= 1;
                    t
                })
                .collect();
            due
        };

        for timer in due {
            if self.world.borrow().exiting {
                break;
            }
            self.journal.push(Event::TimerFired);
            exec_callback(&self.world, &self.journal, &timer.then);
        }
    }

    fn run_teardown(&mut self) {
        let fired = {
            let mut w = self.world.borrow_mut();
            match w.teardown.take() {
                Some((turns, callbacks)) if turns <= 1 => Some(callbacks),
                Some((turns, callbacks)) => {
                    w.teardown = Some((turns - 1, callbacks));
                    None
                }
                None => None,
            }
        };
        for callback in fired.into_iter().flatten() {
            self.journal.push(Event::FinishedCallbackFired);
            callback();
        }
    }
}

impl EventLoop for ScriptedLoop {
    fn run(&mut self, mode: RunMode) {
        self.journal.push(Event::LoopRun(mode));
        self.run_pass();
        if mode == RunMode::Once {
            self.run_teardown();
        }
    }

    fn is_alive(&mut self) -> bool {
        let w = self.world.borrow();
        !w.exiting && !w.stopped && !w.timers.is_empty()
    }

    fn close(&mut self) -> Result<(), LoopCloseError> {
        let w = self.world.borrow();
        let pending_teardown = w.teardown.as_ref().map_or(0, |(_, cbs)| cbs.len());
        let open_handles = w.unref_handles + usize::from(w.isolate_live) + pending_teardown;
        if open_handles > 0 {
            return Err(LoopCloseError { open_handles });
        }
        self.journal.push(Event::LoopClosed);
        Ok(())
    }
}

/// Buffer allocator handed to the scripted isolate
#[derive(Debug, Default)]
pub struct ScriptedAllocator;

pub struct ScriptedIsolate {
    journal: Journal,
    world: SharedWorld,
}

impl IsolateScopes for ScriptedIsolate {
    fn enter_scope(&mut self, kind: ScopeKind) {
        self.journal.push(Event::ScopeEntered(kind));
    }

    fn exit_scope(&mut self, kind: ScopeKind) {
        self.journal.push(Event::ScopeExited(kind));
    }
}

#[derive(Debug)]
pub struct ScriptedContext;

pub struct ScriptedEnvironment {
    body: Vec<Step>,
    world: SharedWorld,
    journal: Journal,
}

impl Environment for ScriptedEnvironment {
    fn load(&mut self, _script: &EntryScript) -> Result<(), ScriptError> {
        match exec(&self.world, &self.journal, &self.body) {
            Ok(()) | Err(Interrupt::Exited) => {
                self.journal.push(Event::ScriptLoaded);
                Ok(())
            }
            Err(Interrupt::Threw(message)) => Err(ScriptError::new(message)),
        }
    }

    fn emit_before_exit(&mut self) -> Option<()> {
        let listeners = {
            let mut w = self.world.borrow_mut();
            if w.exiting || w.stopped {
                return None;
            }
            let listeners = w.before_exit_listeners.clone();
            w.before_exit_listeners.retain(|(_, once)| !once);
            listeners
        };
        self.journal.push(Event::BeforeExit);
        if self.world.borrow().before_exit_broken {
            return None;
        }
        for (listener, _) in listeners {
            if let Err(interrupt) = exec(&self.world, &self.journal, &listener) {
                if let Interrupt::Threw(message) = interrupt {
                    self.journal.push(Event::Uncaught(message));
                    let mut w = self.world.borrow_mut();
                    w.exit_code = Some(1);
                    w.exiting = true;
                }
                return None;
            }
        }
        Some(())
    }

    fn emit_exit(&mut self) -> Option<i32> {
        emit_exit_listeners(&self.world, &self.journal);
        let w = self.world.borrow();
        if w.exit_broken || w.exit_listener_threw {
            return None;
        }
        Some(w.exit_code.unwrap_or(0))
    }

    fn stop(&mut self) {
        self.world.borrow_mut().stopped = true;
        self.journal.push(Event::EnvironmentStopped);
    }
}

impl Drop for ScriptedEnvironment {
    fn drop(&mut self) {
        self.journal.push(Event::EnvironmentFreed);
    }
}

impl Platform for ScriptedPlatform {
    type Loop = ScriptedLoop;
    type Allocator = ScriptedAllocator;
    type Isolate = ScriptedIsolate;
    type Context = ScriptedContext;
    type Environment = ScriptedEnvironment;

    fn process_args(&mut self, args: Vec<String>) -> ArgsOutcome {
        self.journal.push(Event::ArgsProcessed);
        match &self.behavior.reject_args {
            Some((code, errors)) => ArgsOutcome::Exit {
                code: *code,
                errors: errors.clone(),
            },
            None => ArgsOutcome::Run(ProcessedArgs {
                args,
                exec_args: Vec::new(),
            }),
        }
    }

    fn initialize(&mut self) -> Result<(), String> {
        if let Some(message) = &self.behavior.platform_init_error {
            return Err(message.clone());
        }
        self.journal.push(Event::PlatformInitialized);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.journal.push(Event::PlatformShutdown);
    }

    fn entry_script(&self, _args: &ProcessedArgs) -> Option<EntryScript> {
        Some(EntryScript::Inline {
            name: "<scripted>".to_string(),
            source: String::new(),
        })
    }

    fn new_loop(&self) -> Result<ScriptedLoop, LoopInitError> {
        if let Some(name) = &self.behavior.loop_init_error {
            return Err(LoopInitError::new(name.clone()));
        }
        self.journal.push(Event::LoopCreated);
        Ok(ScriptedLoop {
            world: self.world.clone(),
            journal: self.journal.clone(),
        })
    }

    fn new_allocator(&self) -> Arc<ScriptedAllocator> {
        self.journal.push(Event::AllocatorCreated);
        Arc::new(ScriptedAllocator)
    }

    fn new_isolate(
        &self,
        _allocator: &Arc<ScriptedAllocator>,
        event_loop: &mut ScriptedLoop,
    ) -> Option<ScriptedIsolate> {
        if self.behavior.fail_isolate {
            return None;
        }
        self.world.borrow_mut().isolate_live = true;
        self.journal.push(Event::IsolateCreated);
        Some(ScriptedIsolate {
            journal: self.journal.clone(),
            world: event_loop.world.clone(),
        })
    }

    fn new_context(&self, _isolate: &mut ScriptedIsolate) -> Option<ScriptedContext> {
        if self.behavior.fail_context {
            return None;
        }
        self.journal.push(Event::ContextCreated);
        Some(ScriptedContext)
    }

    fn create_environment(
        &self,
        isolate: &mut ScriptedIsolate,
        _context: &ScriptedContext,
        _args: &ProcessedArgs,
    ) -> ScriptedEnvironment {
        self.journal.push(Event::EnvironmentCreated);
        ScriptedEnvironment {
            body: self.body.clone(),
            world: isolate.world.clone(),
            journal: self.journal.clone(),
        }
    }

    fn drain_tasks(&self, isolate: &mut ScriptedIsolate) {
        let tasks = std::mem::take(&mut isolate.world.borrow_mut().tasks);
        self.journal.push(Event::TasksDrained(tasks.len()));
        for task in tasks {
            exec_callback(&isolate.world, &self.journal, &task);
        }
    }

    fn add_isolate_finished_callback(
        &self,
        isolate: &mut ScriptedIsolate,
        callback: IsolateFinishedCallback,
    ) {
        isolate.world.borrow_mut().finished_callbacks.push(callback);
        self.journal.push(Event::FinishedCallbackRegistered);
    }

    fn unregister_isolate(&self, _isolate: &mut ScriptedIsolate) {
        self.journal.push(Event::IsolateUnregistered);
    }

    fn dispose_isolate(&self, isolate: ScriptedIsolate) {
        {
            let mut w = isolate.world.borrow_mut();
            w.isolate_live = false;
            let callbacks = std::mem::take(&mut w.finished_callbacks);
            if !callbacks.is_empty() {
                w.teardown = Some((self.behavior.teardown_turns, callbacks));
            }
        }
        self.journal.push(Event::IsolateDisposed);
    }
}
