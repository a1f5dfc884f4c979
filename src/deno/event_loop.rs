//! Event loop over a current-thread tokio runtime
//!
//! The loop, the isolate and the environment share one [`LoopCore`]: the
//! tokio runtime that drives timers and async ops, the `JsRuntime` while it is
//! registered, and the isolate-finished callbacks waiting to fire.

use super::ops;
use crate::engine::{EventLoop, IsolateFinishedCallback, LoopCloseError, LoopInitError, RunMode};
use deno_core::{JsRuntime, PollEventLoopOptions};
use std::cell::RefCell;
use std::future::poll_fn;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

pub(crate) struct LoopCore {
    pub(crate) tokio: tokio::runtime::Runtime,
    pub(crate) runtime: RefCell<Option<JsRuntime>>,
    pub(crate) teardown: RefCell<Vec<IsolateFinishedCallback>>,
}

impl LoopCore {
    pub(crate) fn new() -> Result<Rc<Self>, LoopInitError> {
        let tokio = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|err| LoopInitError::new(error_name(&err)))?;
        Ok(Rc::new(Self {
            tokio,
            runtime: RefCell::new(None),
            teardown: RefCell::new(Vec::new()),
        }))
    }

    /// Run `f` against the registered runtime inside the tokio context
    pub(crate) fn with_runtime<R>(&self, f: impl FnOnce(&mut JsRuntime) -> R) -> Option<R> {
        let _guard = self.tokio.enter();
        let mut slot = self.runtime.borrow_mut();
        slot.as_mut().map(f)
    }
}

fn error_name(err: &std::io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => format!("{:?} (os error {})", err.kind(), code),
        None => format!("{:?}", err.kind()),
    }
}

/// Report an error that escaped the script and end it with code 1
pub(crate) fn report_uncaught(runtime: &JsRuntime, err: impl std::fmt::Display) {
    if ops::exit_state(runtime).requested {
        return;
    }
    tracing::debug!("uncaught error in event loop");
    eprintln!("{}", err);
    ops::force_exit(runtime, 1);
}

pub struct DenoLoop {
    pub(crate) core: Rc<LoopCore>,
}

impl DenoLoop {
    /// A single non-blocking poll of the runtime
    fn poll_once(&mut self) {
        self.core
            .with_runtime(|runtime| {
                if ops::exit_state(runtime).requested {
                    return;
                }
                let mut cx = Context::from_waker(Waker::noop());
                if let Poll::Ready(Err(err)) =
                    runtime.poll_event_loop(&mut cx, PollEventLoopOptions::default())
                {
                    report_uncaught(runtime, err);
                }
            });
    }

    fn run_to_completion(&mut self) {
        let core = &self.core;
        let mut slot = core.runtime.borrow_mut();
        let Some(runtime) = slot.as_mut() else {
            return;
        };

        let result = core.tokio.block_on(poll_fn(|cx| {
            if ops::exit_state(runtime).requested {
                return Poll::Ready(Ok(()));
            }
            runtime.poll_event_loop(cx, PollEventLoopOptions::default())
        }));
        if let Err(err) = result {
            report_uncaught(runtime, err);
        }
    }

    fn fire_teardown(&mut self) {
        let callbacks = std::mem::take(&mut *self.core.teardown.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }
}

impl EventLoop for DenoLoop {
    fn run(&mut self, mode: RunMode) {
        match mode {
            RunMode::Default => self.run_to_completion(),
            RunMode::Once => {
                self.poll_once();
                self.fire_teardown();
            }
        }
    }

    /// Pending timers, read without polling so no script code runs here
    fn is_alive(&mut self) -> bool {
        self.core
            .with_runtime(|runtime| {
                !ops::exit_state(runtime).requested && ops::active_timers(runtime) > 0
            })
            .unwrap_or(false)
    }

    fn close(&mut self) -> Result<(), LoopCloseError> {
        let registered = usize::from(self.core.runtime.borrow().is_some());
        let open_handles = registered + self.core.teardown.borrow().len();
        if open_handles > 0 {
            return Err(LoopCloseError { open_handles });
        }
        Ok(())
    }
}
