//! Shutdown sequencing
//!
//! Order: exit signal, environment stop, scope release (by the caller),
//! isolate disposal, teardown wait, loop close. The loop is never closed
//! before the platform reports the isolate's resources released.

use super::state::BootState;
use super::Lifecycle;
use crate::engine::{Environment, EventLoop, Platform, RunMode};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

/// Emit `exit` and resolve the process exit code (1 if the signal yields none)
pub fn signal_exit<E: Environment>(env: &mut E) -> i32 {
    match env.emit_exit() {
        Some(code) => code,
        None => {
            tracing::warn!("exit signal produced no code, using 1");
            1
        }
    }
}

/// Stop and free the environment
pub fn stop_environment<E: Environment>(mut env: E) {
    env.stop();
    drop(env);
}

/// Dispose the isolate, wait for the platform's teardown, then close the loop.
///
/// Called once every scope on the isolate has been released.
///
/// # Panics
///
/// Panics if the loop still has open handles when it is closed.
pub(crate) fn release<P: Platform>(
    platform: &P,
    lifecycle: &mut Lifecycle,
    event_loop: &mut P::Loop,
    mut isolate: P::Isolate,
    allocator: Arc<P::Allocator>,
) {
    let finished = Rc::new(Cell::new(false));
    let flag = finished.clone();
    platform.add_isolate_finished_callback(&mut isolate, Box::new(move || flag.set(true)));
    platform.unregister_isolate(&mut isolate);
    platform.dispose_isolate(isolate);
    drop(allocator);
    lifecycle.enter(BootState::IsolateDisposed);

    let mut turns = 0usize;
    while !finished.get() {
        event_loop.run(RunMode::Once);
        turns += 1;
    }
    tracing::debug!(turns, "isolate teardown finished");

    if let Err(err) = event_loop.close() {
        tracing::error!(target: "lifecycle", "loop close failed: {}", err);
        panic!("loop close failed after isolate teardown: {}", err);
    }
    lifecycle.enter(BootState::LoopClosed);
}
