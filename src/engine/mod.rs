//! Engine collaborator interfaces
//!
//! The bootstrapper never talks to a JavaScript engine or an event loop
//! directly. It drives them through the traits in this module:
//!
//! - [`Platform`] - process-wide engine services: argument processing,
//!   one-time initialization, loop/isolate/context/environment factories,
//!   background task draining and isolate teardown
//! - [`EventLoop`] - the single-threaded loop backing the isolate
//! - [`Environment`] - an isolate + context + arguments bound into a runnable
//!   unit that loads script code and receives lifecycle signals
//! - [`IsolateScopes`] - enter/exit hooks used by the scope guards in
//!   [`scope`]
//!
//! Two implementations live in the crate: the `deno` backend (feature
//! `runtime`) and the deterministic [`scripted`] backend.

pub mod scope;
pub mod scripted;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use scope::{Scope, ScopeKind};

/// How far a single call to [`EventLoop::run`] goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Service ready callbacks until the loop reports no more work
    Default,
    /// Service whatever is ready once and return
    Once,
}

/// Loop initialization failure, carrying the platform's symbolic error name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}")]
pub struct LoopInitError {
    pub name: String,
}

impl LoopInitError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The loop still owned live handles when it was closed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event loop still has {open_handles} open handle(s)")]
pub struct LoopCloseError {
    pub open_handles: usize,
}

/// The entry script raised while it was being loaded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of the engine's own argument processing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessedArgs {
    /// Program name, entry script and script arguments
    pub args: Vec<String>,
    /// Host/engine options consumed by the engine
    pub exec_args: Vec<String>,
}

/// What the bootstrapper should do after argument processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsOutcome {
    Run(ProcessedArgs),
    /// Stop before touching the engine (help, version, bad flags)
    Exit { code: i32, errors: Vec<String> },
}

/// Script body handed to the environment loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryScript {
    /// Inline source evaluated as the bootstrap body
    Inline { name: String, source: String },
    /// A module on disk, loaded through the built-in `require` bootstrap
    Module(std::path::PathBuf),
}

impl fmt::Display for EntryScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryScript::Inline { name, .. } => write!(f, "{}", name),
            EntryScript::Module(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Enter/exit hooks for the isolate's nested scopes
pub trait IsolateScopes {
    fn enter_scope(&mut self, kind: ScopeKind);
    fn exit_scope(&mut self, kind: ScopeKind);
}

/// The event loop collaborator
pub trait EventLoop {
    /// Run the loop in the given mode
    fn run(&mut self, mode: RunMode);

    /// Whether the loop still has outstanding work (active handles/requests)
    fn is_alive(&mut self) -> bool;

    /// Release the loop. Fails if handles are still open.
    fn close(&mut self) -> Result<(), LoopCloseError>;
}

/// A loaded, runnable environment
pub trait Environment {
    /// Load the script body. An error means an exception was pending.
    fn load(&mut self, script: &EntryScript) -> Result<(), ScriptError>;

    /// Emit `beforeExit`. `None` means the signal itself failed.
    fn emit_before_exit(&mut self) -> Option<()>;

    /// Emit `exit` and report the resulting exit code, if any
    fn emit_exit(&mut self) -> Option<i32>;

    /// Stop the environment; no further script code runs afterwards
    fn stop(&mut self);
}

/// Callback fired by the platform once an isolate's resources are released
pub type IsolateFinishedCallback = Box<dyn FnOnce()>;

/// Process-wide engine services
pub trait Platform {
    type Loop: EventLoop;
    type Allocator;
    type Isolate: IsolateScopes;
    type Context;
    type Environment: Environment;

    /// Split host options from script arguments
    fn process_args(&mut self, args: Vec<String>) -> ArgsOutcome;

    /// One-time global engine initialization
    fn initialize(&mut self) -> Result<(), String>;

    /// Counterpart of [`Platform::initialize`]
    fn shutdown(&mut self);

    /// Which script to load for these arguments
    fn entry_script(&self, args: &ProcessedArgs) -> Option<EntryScript>;

    fn new_loop(&self) -> Result<Self::Loop, LoopInitError>;

    fn new_allocator(&self) -> Arc<Self::Allocator>;

    /// Create an isolate bound to the loop. `None` on allocation failure.
    fn new_isolate(
        &self,
        allocator: &Arc<Self::Allocator>,
        event_loop: &mut Self::Loop,
    ) -> Option<Self::Isolate>;

    /// Create the execution context. `None` if the engine refused.
    fn new_context(&self, isolate: &mut Self::Isolate) -> Option<Self::Context>;

    fn create_environment(
        &self,
        isolate: &mut Self::Isolate,
        context: &Self::Context,
        args: &ProcessedArgs,
    ) -> Self::Environment;

    /// Run pending background tasks posted for this isolate
    fn drain_tasks(&self, isolate: &mut Self::Isolate);

    fn add_isolate_finished_callback(
        &self,
        isolate: &mut Self::Isolate,
        callback: IsolateFinishedCallback,
    );

    fn unregister_isolate(&self, isolate: &mut Self::Isolate);

    fn dispose_isolate(&self, isolate: Self::Isolate);
}
