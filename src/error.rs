//! Bootstrap error taxonomy

use crate::engine::{LoopInitError, ScriptError};
use thiserror::Error;

/// A fatal condition raised while starting or running the instance.
///
/// Every variant maps to exit code 1. Loop-close failures are not listed
/// here: they are invariant violations and panic instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootError {
    #[error("Failed to initialize the platform: {0}")]
    PlatformInit(String),

    #[error("Failed to initialize loop: {0}")]
    LoopInit(#[from] LoopInitError),

    #[error("Failed to initialize V8 Isolate")]
    IsolateAlloc,

    #[error("Failed to initialize V8 Context")]
    ContextCreate,

    #[error("no entry script given")]
    NoEntryScript,

    #[error("Failed to load {entry}: {source}")]
    ScriptLoad {
        entry: String,
        #[source]
        source: ScriptError,
    },

    #[error("the runtime engine has already been started")]
    AlreadyStarted,
}

impl BootError {
    pub fn exit_code(&self) -> i32 {
        1
    }
}
