//! Host ops exposed to the prelude through `Deno.core.ops`

use super::resolve;
use deno_core::{op2, CancelFuture, CancelHandle, OpState, RcRef, Resource, ResourceId};
use deno_error::JsErrorBox;
use std::borrow::Cow;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// Exit bookkeeping shared between script code and the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitState {
    /// Last exit code reported by the script, or forced by the host
    pub code: Option<i32>,
    /// `process.exit()` was called, or an uncaught error ended the script
    pub requested: bool,
}

#[op2]
#[string]
fn op_host_cwd() -> Result<String, JsErrorBox> {
    std::env::current_dir()
        .map(|dir| dir.to_string_lossy().into_owned())
        .map_err(JsErrorBox::from_err)
}

#[op2]
#[string]
fn op_host_read_file(#[string] path: String) -> Result<String, JsErrorBox> {
    std::fs::read_to_string(&path)
        .map_err(|err| JsErrorBox::generic(format!("Cannot read module '{}': {}", path, err)))
}

#[op2]
#[string]
fn op_host_resolve(
    #[string] specifier: String,
    #[string] from_dir: String,
) -> Result<String, JsErrorBox> {
    resolve::resolve(&specifier, Path::new(&from_dir))
        .map(|path| path.to_string_lossy().into_owned())
        .map_err(|err| JsErrorBox::new("Error", err.to_string()))
}

#[op2]
#[string]
fn op_host_dirname(#[string] path: String) -> String {
    Path::new(&path)
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

/// Timers that are scheduled and have neither fired nor been cleared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerState {
    pub active: usize,
}

/// One pending `setTimeout`; closing it cancels the sleep
struct TimerResource {
    cancel: CancelHandle,
}

impl Resource for TimerResource {
    fn name(&self) -> Cow<'_, str> {
        "hostTimer".into()
    }

    fn close(self: Rc<Self>) {
        self.cancel.cancel();
    }
}

#[op2(fast)]
#[smi]
fn op_host_timer_start(state: &mut OpState) -> ResourceId {
    state.borrow_mut::<TimerState>().active += 1;
    state.resource_table.add(TimerResource {
        cancel: CancelHandle::new(),
    })
}

/// Resolves to `true` when the delay elapsed, `false` when the timer was cleared
#[op2(async)]
async fn op_host_timer_sleep(
    state: Rc<RefCell<OpState>>,
    #[smi] rid: ResourceId,
    #[number] millis: u64,
) -> bool {
    let Ok(resource) = state.borrow().resource_table.get::<TimerResource>(rid) else {
        return false;
    };
    let cancel = RcRef::map(&resource, |r| &r.cancel);
    tokio::time::sleep(Duration::from_millis(millis))
        .or_cancel(cancel)
        .await
        .is_ok()
}

/// Retire a timer: cancels its sleep if still pending. Unknown ids are ignored.
#[op2(fast)]
fn op_host_timer_clear(state: &mut OpState, #[smi] rid: ResourceId) {
    if let Ok(resource) = state.resource_table.take::<TimerResource>(rid) {
        resource.cancel.cancel();
        let timers = state.borrow_mut::<TimerState>();
        timers.active = timers.active.saturating_sub(1);
    }
}

#[op2(fast)]
fn op_host_set_exit_code(state: &mut OpState, #[smi] code: i32) {
    state.borrow_mut::<ExitState>().code = Some(code);
}

#[op2(fast)]
fn op_host_request_exit(state: &mut OpState, #[smi] code: i32) {
    let exit = state.borrow_mut::<ExitState>();
    exit.code = Some(code);
    exit.requested = true;
}

deno_core::extension!(
    jshost_runtime,
    ops = [
        op_host_cwd,
        op_host_read_file,
        op_host_resolve,
        op_host_dirname,
        op_host_timer_start,
        op_host_timer_sleep,
        op_host_timer_clear,
        op_host_set_exit_code,
        op_host_request_exit,
    ],
    state = |state| {
        state.put(ExitState::default());
        state.put(TimerState::default());
    }
);

pub fn extension() -> deno_core::Extension {
    jshost_runtime::init()
}

/// Current exit bookkeeping of `runtime`
pub fn exit_state(runtime: &deno_core::JsRuntime) -> ExitState {
    *runtime.op_state().borrow().borrow::<ExitState>()
}

/// Number of timers still pending in `runtime`
pub fn active_timers(runtime: &deno_core::JsRuntime) -> usize {
    runtime.op_state().borrow().borrow::<TimerState>().active
}

/// Mark the script as finished with `code` (uncaught errors)
pub fn force_exit(runtime: &deno_core::JsRuntime, code: i32) {
    let op_state = runtime.op_state();
    let mut state = op_state.borrow_mut();
    let exit = state.borrow_mut::<ExitState>();
    exit.code = Some(code);
    exit.requested = true;
}
