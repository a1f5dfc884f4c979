//! E2E tests for the drain loop and the beforeExit protocol

use crate::common::harness::BootHarness;
use jshost::engine::scripted::{Event, Step};
use jshost::engine::RunMode;

fn timer(turns: u32, then: Vec<Step>) -> Step {
    Step::SetTimeout { turns, then }
}

fn log(message: &str) -> Step {
    Step::Log(message.to_string())
}

/// Positions of every occurrence of `event` in `events`
fn positions(events: &[Event], event: &Event) -> Vec<usize> {
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| *e == event)
        .map(|(i, _)| i)
        .collect()
}

/// A script with no pending work exits after a single pass and one beforeExit
#[test]
fn test_exit_code_without_pending_work() {
    let mut harness = BootHarness::new(vec![Step::SetExitCode(3)]);
    assert_eq!(harness.exit_code(), 3);

    let report = harness.drain_report();
    assert_eq!(report.passes, 1);
    assert_eq!(report.before_exit_signals, 1);
    assert!(!report.before_exit_failed);
    assert_eq!(harness.count(&Event::BeforeExit), 1);
    assert_eq!(harness.count(&Event::LoopRun(RunMode::Default)), 1);
}

/// A pending timer keeps the drain going until it has fired
#[test]
fn test_timer_fires_before_exit() {
    let mut harness = BootHarness::new(vec![timer(1, vec![log("tick")])]);
    assert_eq!(harness.exit_code(), 0);

    assert!(harness.drain_report().passes >= 2);
    assert_eq!(harness.count(&Event::TimerFired), 1);
    assert!(harness.contains(&Event::Log("tick".into())));
    harness.assert_before(&Event::TimerFired, &Event::BeforeExit);
    harness.assert_before(&Event::BeforeExit, &Event::EnvironmentStopped);
}

/// Work scheduled by a beforeExit listener is drained, followed by a fresh
/// beforeExit, and nothing runs after exit
#[test]
fn test_before_exit_listener_reschedules_work() {
    let mut harness = BootHarness::new(vec![Step::OnceBeforeExit(vec![timer(
        0,
        vec![log("rescheduled")],
    )])]);
    assert_eq!(harness.exit_code(), 0);

    let report = harness.drain_report();
    assert_eq!(report.before_exit_signals, 2);
    assert_eq!(report.passes, 2);
    assert!(harness.contains(&Event::Log("rescheduled".into())));

    let events = harness.events();
    let signals = positions(&events, &Event::BeforeExit);
    assert_eq!(signals.len(), 2);
    let runs = positions(&events, &Event::LoopRun(RunMode::Default));
    assert!(
        runs.iter().any(|&r| r > signals[0] && r < signals[1]),
        "no loop run between beforeExit signals in {:#?}",
        events
    );
    harness.assert_before(&Event::Log("rescheduled".into()), &Event::Exit);

    let exit = positions(&events, &Event::Exit);
    assert_eq!(exit.len(), 1);
    assert!(signals.iter().all(|&s| s < exit[0]));
}

/// A listener that keeps rescheduling for a few rounds gets one beforeExit
/// per idle point
#[test]
fn test_each_idle_point_gets_one_signal() {
    let rearm = |rest: Vec<Step>| Step::OnceBeforeExit(vec![timer(0, rest)]);
    let body = vec![rearm(vec![rearm(vec![rearm(Vec::new())])])];
    let mut harness = BootHarness::new(body);
    assert_eq!(harness.exit_code(), 0);

    assert_eq!(harness.count(&Event::BeforeExit), 4);
    assert_eq!(harness.count(&Event::TimerFired), 3);
    assert_eq!(harness.drain_report().passes, 4);
}

/// `process.exit` inside a beforeExit listener ends the drain with its code
#[test]
fn test_exit_from_before_exit_listener() {
    let mut harness = BootHarness::new(vec![
        Step::OnBeforeExit(vec![Step::Exit(7)]),
        Step::OnExit(vec![log("exit listener")]),
    ]);
    assert_eq!(harness.exit_code(), 7);

    let report = harness.drain_report();
    assert!(report.before_exit_failed);
    assert_eq!(report.before_exit_signals, 1);
    assert_eq!(harness.count(&Event::BeforeExit), 1);
    assert_eq!(harness.count(&Event::Exit), 1);
    assert_eq!(harness.count(&Event::Log("exit listener".into())), 1);
}

/// An engine-level failure to emit beforeExit stops the drain
#[test]
fn test_failed_before_exit_stops_drain() {
    let mut harness = BootHarness::new(vec![
        Step::FailBeforeExit,
        Step::OnBeforeExit(vec![log("never")]),
        timer(0, vec![log("tick")]),
    ]);
    assert_eq!(harness.exit_code(), 0);

    let report = harness.drain_report();
    assert!(report.before_exit_failed);
    assert_eq!(report.passes, 1);
    harness.assert_absent(&Event::Log("never".into()));
    assert!(harness.contains(&Event::Log("tick".into())));
}

/// An exception thrown from a timer callback exits with 1
#[test]
fn test_uncaught_timer_exception() {
    let mut harness = BootHarness::new(vec![
        timer(0, vec![Step::Throw("TypeError: x is not a function".into())]),
        Step::OnBeforeExit(vec![log("before exit")]),
    ]);
    assert_eq!(harness.exit_code(), 1);

    assert!(harness.contains(&Event::Uncaught("TypeError: x is not a function".into())));
    assert!(harness.drain_report().before_exit_failed);
    harness.assert_absent(&Event::BeforeExit);
    harness.assert_absent(&Event::Log("before exit".into()));
}

/// Posted platform tasks run between loop passes
#[test]
fn test_platform_tasks_are_drained() {
    let mut harness = BootHarness::new(vec![Step::PostTask(vec![log("task")])]);
    assert_eq!(harness.exit_code(), 0);

    assert!(harness.contains(&Event::TasksDrained(1)));
    harness.assert_before(&Event::LoopRun(RunMode::Default), &Event::TasksDrained(1));
    harness.assert_before(&Event::Log("task".into()), &Event::BeforeExit);
}

/// Exiting from one timer cancels the timers still queued behind it
#[test]
fn test_exit_from_timer_skips_later_timers() {
    let mut harness = BootHarness::new(vec![
        timer(0, vec![Step::Exit(5)]),
        timer(0, vec![log("late")]),
        timer(3, vec![log("later")]),
    ]);
    assert_eq!(harness.exit_code(), 5);

    assert_eq!(harness.count(&Event::TimerFired), 1);
    harness.assert_absent(&Event::Log("late".into()));
    harness.assert_absent(&Event::Log("later".into()));
    harness.assert_absent(&Event::BeforeExit);
    assert_eq!(harness.drain_report().passes, 1);
}
