//! Lifecycle journal layer for tracing
//!
//! A tracing layer that appends every event with target "lifecycle" (state
//! transitions of the instance, loop close failures) to a separate file, one
//! timestamped line per event. The journal is useful when the process is run
//! under a supervisor that discards stderr.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Environment variable naming the journal file
pub const LIFECYCLE_LOG_ENV: &str = "JSHOST_LIFECYCLE_LOG";

/// A tracing layer that writes lifecycle events to a file
pub struct LifecycleLogLayer {
    file: Arc<Mutex<File>>,
}

/// Handle returned from setup, containing the journal path
pub struct LifecycleLogHandle {
    pub path: PathBuf,
}

/// Open (appending) the journal at `path` and build the layer for it
pub fn create_with_path(
    path: PathBuf,
) -> std::io::Result<(LifecycleLogLayer, LifecycleLogHandle)> {
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let layer = LifecycleLogLayer {
        file: Arc::new(Mutex::new(file)),
    };

    Ok((layer, LifecycleLogHandle { path }))
}

impl<S> Layer<S> for LifecycleLogLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target() != "lifecycle" {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!(
            "{} {} pid={} {}\n",
            timestamp,
            metadata.level(),
            std::process::id(),
            visitor.0
        );

        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}
