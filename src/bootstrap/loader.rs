//! Environment loading
//!
//! Picks the entry script for the processed arguments and hands it to the
//! environment. A load that leaves an exception pending is fatal: the
//! environment is never driven further.

use crate::engine::{EntryScript, Environment, Platform, ProcessedArgs};
use crate::error::BootError;

pub fn load<P: Platform>(
    platform: &P,
    env: &mut P::Environment,
    args: &ProcessedArgs,
) -> Result<EntryScript, BootError> {
    let script = platform
        .entry_script(args)
        .ok_or(BootError::NoEntryScript)?;

    tracing::debug!("loading entry script {}", script);
    env.load(&script).map_err(|source| BootError::ScriptLoad {
        entry: script.to_string(),
        source,
    })?;
    Ok(script)
}
