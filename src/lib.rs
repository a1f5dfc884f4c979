// jshost library - exposes the bootstrap core and its engine backends for testing
//
// The bootstrap sequence (bootstrap/) only talks to the engine through the
// traits in engine/. Two backends implement them:
// 1. deno/ - V8 through deno_core, driven on a current-thread tokio runtime
//    (feature "runtime", used by the jshost binary)
// 2. engine::scripted - a deterministic in-process engine used by the tests
//
// The V8 platform is process-wide and cannot be re-initialized once disposed,
// so the deno backend creates it lazily on first use and never tears it down.

// Core modules at root level
pub mod args;
pub mod config;
pub mod error;

// Organized modules
pub mod bootstrap;
pub mod engine;

#[cfg(feature = "runtime")]
pub mod deno;
#[cfg(feature = "runtime")]
pub mod logging;
#[cfg(feature = "runtime")]
pub mod os;
#[cfg(feature = "runtime")]
pub mod services;

pub use bootstrap::RuntimeEngine;
pub use error::BootError;
