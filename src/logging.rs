//! Subscriber setup
//!
//! Human-readable logs go to stderr through an `EnvFilter`; the lifecycle
//! journal, when configured, sees every lifecycle event regardless of that
//! filter.

use crate::services::lifecycle_log::{self, LifecycleLogHandle};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Environment variable holding the stderr filter directive
pub const LOG_ENV: &str = "JSHOST_LOG";

pub const DEFAULT_FILTER: &str = "warn";

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Filter directive; [`DEFAULT_FILTER`] when `None` or unparsable
    pub filter: Option<String>,
    /// Lifecycle journal file
    pub lifecycle_log: Option<PathBuf>,
}

fn build_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Returns the journal handle if one was opened.
pub fn init(options: &LoggingOptions) -> Option<LifecycleLogHandle> {
    let (journal, handle) = match &options.lifecycle_log {
        Some(path) => match lifecycle_log::create_with_path(path.clone()) {
            Ok((layer, handle)) => (Some(layer), Some(handle)),
            Err(err) => {
                eprintln!(
                    "warning: cannot open lifecycle log {}: {}",
                    path.display(),
                    err
                );
                (None, None)
            }
        },
        None => (None, None),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(build_filter(options.filter.as_deref()));

    // A subscriber may already be installed (tests); keep it
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(journal)
        .try_init();

    handle
}
