use crate::args::{ArgsError, NormalizedArgs};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use once_cell::sync::OnceCell;
use std::os::unix::ffi::OsStringExt;

static AT_SECURE: OnceCell<bool> = OnceCell::new();

pub(super) fn prepare_process() {
    // Writes to a closed pipe must surface as EPIPE, not kill the process
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    if let Err(err) = unsafe { sigaction(Signal::SIGPIPE, &ignore) } {
        tracing::warn!("failed to ignore SIGPIPE: {}", err);
    }

    AT_SECURE.get_or_init(read_at_secure);
}

#[cfg(target_os = "linux")]
fn read_at_secure() -> bool {
    unsafe { libc::getauxval(libc::AT_SECURE) != 0 }
}

#[cfg(not(target_os = "linux"))]
fn read_at_secure() -> bool {
    false
}

pub(super) fn secure_execution() -> bool {
    *AT_SECURE.get_or_init(read_at_secure)
}

pub(super) fn native_args() -> Result<NormalizedArgs, ArgsError> {
    NormalizedArgs::from_bytes(std::env::args_os().map(OsStringExt::into_vec))
}
