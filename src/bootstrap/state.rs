//! Instance lifecycle state machine

use std::fmt;
use thiserror::Error;

/// Where a single instance is in its lifecycle.
///
/// States only move forward one step at a time. Any non-final state may
/// jump to [`BootState::Terminated`] with a non-zero code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Uninitialized,
    PlatformReady,
    IsolateCreated,
    ContextCreated,
    EnvironmentLoaded,
    Draining,
    ExitSignaled,
    Stopped,
    IsolateDisposed,
    LoopClosed,
    Terminated(i32),
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootState::Terminated(code) => write!(f, "Terminated({})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    pub from: BootState,
    pub to: BootState,
}

impl BootState {
    /// The state reached when the current step succeeds
    pub fn successor(self) -> Option<BootState> {
        use BootState::*;
        match self {
            Uninitialized => Some(PlatformReady),
            PlatformReady => Some(IsolateCreated),
            IsolateCreated => Some(ContextCreated),
            ContextCreated => Some(EnvironmentLoaded),
            EnvironmentLoaded => Some(Draining),
            Draining => Some(ExitSignaled),
            ExitSignaled => Some(Stopped),
            Stopped => Some(IsolateDisposed),
            IsolateDisposed => Some(LoopClosed),
            LoopClosed | Terminated(_) => None,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, BootState::LoopClosed | BootState::Terminated(_))
    }

    /// Move to `to`, logging the transition at target `lifecycle`
    pub fn advance(&mut self, to: BootState) -> Result<(), TransitionError> {
        let legal = match to {
            BootState::Terminated(code) => code != 0 && !self.is_final(),
            _ => self.successor() == Some(to),
        };
        if !legal {
            return Err(TransitionError { from: *self, to });
        }

        tracing::info!(target: "lifecycle", "{} -> {}", self, to);
        *self = to;
        Ok(())
    }
}
