//! Per-platform entry adapters
//!
//! Everything OS specific that happens before the bootstrapper runs lives
//! here: process preparation, acquisition of the native argument vector and
//! the secure-execution flag. All adapters produce the same
//! [`NormalizedArgs`].

use crate::args::{ArgsError, NormalizedArgs};
use crate::config::CONFIG_ENV;
use crate::logging::LOG_ENV;
use crate::services::lifecycle_log::LIFECYCLE_LOG_ENV;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Environment variable that bypasses the Windows version check
pub const SKIP_CHECK_VAR: &str = "NODE_SKIP_PLATFORM_CHECK";

/// Whether a [`SKIP_CHECK_VAR`] value requests skipping the check.
/// Only the exact value `1` does.
pub fn skip_platform_check(value: Option<&OsStr>) -> bool {
    value == Some(OsStr::new("1"))
}

/// Host settings taken from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    pub config_path: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub lifecycle_log: Option<PathBuf>,
    pub skip_platform_check: bool,
}

impl HostEnv {
    /// Read settings through `lookup`. In secure-execution mode the `JSHOST_*`
    /// variables are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>, secure: bool) -> Self {
        let trusted = |name: &str| if secure { None } else { lookup(name) };
        Self {
            config_path: trusted(CONFIG_ENV).map(PathBuf::from),
            log_filter: trusted(LOG_ENV).map(|v| v.to_string_lossy().into_owned()),
            lifecycle_log: trusted(LIFECYCLE_LOG_ENV).map(PathBuf::from),
            skip_platform_check: skip_platform_check(lookup(SKIP_CHECK_VAR).as_deref()),
        }
    }

    pub fn from_process() -> Self {
        Self::from_lookup(|name| std::env::var_os(name), secure_execution())
    }
}

/// One-time process setup, before any argument or engine work
pub fn prepare_process() {
    #[cfg(unix)]
    unix::prepare_process();
}

/// The process arguments, normalized
pub fn native_args() -> Result<NormalizedArgs, ArgsError> {
    #[cfg(unix)]
    return unix::native_args();
    #[cfg(windows)]
    return windows::native_args();
    #[cfg(not(any(unix, windows)))]
    NormalizedArgs::from_bytes(std::env::args().map(String::into_bytes))
}

/// Linux secure-execution mode (`AT_SECURE`), captured by [`prepare_process`]
pub fn secure_execution() -> bool {
    #[cfg(unix)]
    return unix::secure_execution();
    #[cfg(not(unix))]
    false
}

/// Warn when running on an OS release older than the supported minimum.
/// Never stops the process.
pub fn check_platform(skip: bool) {
    if skip {
        tracing::debug!("platform check skipped");
        return;
    }
    #[cfg(windows)]
    windows::check_version();
}
