//! E2E tests for the shutdown ordering and loop close

use crate::common::harness::BootHarness;
use jshost::bootstrap::state::BootState;
use jshost::engine::scripted::{Event, ScriptedPlatform, Step};
use jshost::engine::{RunMode, ScopeKind};

/// `depth` timers, each scheduled by the previous one's callback
fn chained_timers(depth: usize) -> Vec<Step> {
    let mut body = Vec::new();
    for i in (0..depth).rev() {
        body = vec![Step::SetTimeout {
            turns: (i % 3) as u32,
            then: body,
        }];
    }
    body
}

fn assert_orderly_shutdown(harness: &BootHarness) {
    let chain = [
        Event::Exit,
        Event::EnvironmentStopped,
        Event::ScopeExited(ScopeKind::Locker),
        Event::FinishedCallbackRegistered,
        Event::IsolateUnregistered,
        Event::IsolateDisposed,
        Event::FinishedCallbackFired,
        Event::LoopClosed,
        Event::PlatformShutdown,
    ];
    for pair in chain.windows(2) {
        harness.assert_before(&pair[0], &pair[1]);
    }
    harness.assert_before(&Event::EnvironmentFreed, &Event::IsolateDisposed);
    assert_eq!(harness.count(&Event::LoopClosed), 1);
    assert_eq!(harness.state(), BootState::LoopClosed);
}

#[test]
fn test_shutdown_order_without_timers() {
    let mut harness = BootHarness::new(chained_timers(0));
    assert_eq!(harness.exit_code(), 0);
    assert_orderly_shutdown(&harness);
}

#[test]
fn test_shutdown_order_after_one_timer() {
    let mut harness = BootHarness::new(chained_timers(1));
    assert_eq!(harness.exit_code(), 0);
    assert_eq!(harness.count(&Event::TimerFired), 1);
    assert_orderly_shutdown(&harness);
}

#[test]
fn test_shutdown_order_after_chained_timers() {
    let mut harness = BootHarness::new(chained_timers(12));
    assert_eq!(harness.exit_code(), 0);
    assert_eq!(harness.count(&Event::TimerFired), 12);
    assert_orderly_shutdown(&harness);

    // Every timer fired before the loop was closed
    let events = harness.events();
    let closed = harness.filtered(|e| *e == Event::LoopClosed);
    assert_eq!(closed.len(), 1);
    let last_timer = events
        .iter()
        .rposition(|e| *e == Event::TimerFired)
        .unwrap();
    let close = events.iter().position(|e| *e == Event::LoopClosed).unwrap();
    assert!(last_timer < close);
}

/// The loop keeps turning in `Once` mode until the isolate's teardown finishes
#[test]
fn test_waits_for_isolate_teardown() {
    let mut harness =
        BootHarness::with_platform(ScriptedPlatform::new(Vec::new()).teardown_turns(3));
    assert_eq!(harness.exit_code(), 0);

    assert_eq!(harness.count(&Event::LoopRun(RunMode::Once)), 3);
    assert_eq!(harness.count(&Event::FinishedCallbackFired), 1);
    harness.assert_before(&Event::FinishedCallbackFired, &Event::LoopClosed);
}

/// A handle left open past teardown is a fatal invariant violation
#[test]
#[should_panic(expected = "loop close failed")]
fn test_leaked_handle_panics_on_close() {
    let mut harness = BootHarness::new(vec![Step::OpenUnrefHandle, Step::SetExitCode(0)]);
    let _ = harness.start();
}

/// Exit listeners may still change the exit code
#[test]
fn test_exit_listener_sets_code() {
    let mut harness = BootHarness::new(vec![
        Step::SetExitCode(2),
        Step::OnExit(vec![Step::SetExitCode(6)]),
    ]);
    assert_eq!(harness.exit_code(), 6);
    assert_orderly_shutdown(&harness);
}

/// An exit listener that throws turns the run into a failure
#[test]
fn test_throwing_exit_listener_exits_with_one() {
    let mut harness = BootHarness::new(vec![
        Step::SetExitCode(4),
        Step::OnExit(vec![Step::Throw("in exit".into())]),
    ]);
    assert_eq!(harness.exit_code(), 1);
    assert!(harness.contains(&Event::Uncaught("in exit".into())));
    assert_orderly_shutdown(&harness);
}

/// An exit signal that yields no code falls back to 1 and still shuts down
#[test]
fn test_missing_exit_code_falls_back_to_one() {
    let mut harness = BootHarness::new(vec![Step::SetExitCode(0), Step::FailExit]);
    assert_eq!(harness.exit_code(), 1);
    assert_orderly_shutdown(&harness);
}
