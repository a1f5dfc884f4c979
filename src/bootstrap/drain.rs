//! The drain loop
//!
//! Services the event loop until it has no outstanding work, giving the
//! script one `beforeExit` signal each time the loop goes idle. Listeners may
//! schedule new work, in which case draining resumes.

use crate::engine::{Environment, EventLoop, Platform, RunMode};

/// What happened while draining
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Number of `Default` mode loop runs
    pub passes: usize,
    /// Number of `beforeExit` emissions attempted
    pub before_exit_signals: usize,
    /// Whether the last emission reported failure and stopped the drain
    pub before_exit_failed: bool,
}

/// Drain `event_loop`. The caller holds the isolate sealed for the duration.
pub fn drain<P: Platform>(
    platform: &P,
    event_loop: &mut P::Loop,
    isolate: &mut P::Isolate,
    env: &mut P::Environment,
) -> DrainReport {
    let mut report = DrainReport::default();

    loop {
        event_loop.run(RunMode::Default);
        report.passes += 1;
        platform.drain_tasks(isolate);

        if event_loop.is_alive() {
            continue;
        }

        report.before_exit_signals += 1;
        if env.emit_before_exit().is_none() {
            report.before_exit_failed = true;
            break;
        }

        if !event_loop.is_alive() {
            break;
        }
        tracing::debug!("beforeExit scheduled more work, resuming drain");
    }

    tracing::debug!(
        passes = report.passes,
        before_exit_signals = report.before_exit_signals,
        "drain finished"
    );
    report
}
