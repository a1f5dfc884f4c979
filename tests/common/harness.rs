//! Test harness around the scripted engine
//!
//! Runs one instance of the bootstrapper on a [`ScriptedPlatform`] and offers
//! assertions over the journal of collaborator calls it produced.

use jshost::bootstrap::drain::DrainReport;
use jshost::bootstrap::state::BootState;
use jshost::engine::scripted::{Event, Journal, ScriptedPlatform, Step};
use jshost::{BootError, RuntimeEngine};

pub struct BootHarness {
    engine: RuntimeEngine<ScriptedPlatform>,
    journal: Journal,
}

impl BootHarness {
    /// Harness for a script body with default collaborator behavior
    pub fn new(body: Vec<Step>) -> Self {
        Self::with_platform(ScriptedPlatform::new(body))
    }

    /// Harness for a platform configured with injected failures
    pub fn with_platform(platform: ScriptedPlatform) -> Self {
        let journal = platform.journal();
        Self {
            engine: RuntimeEngine::new(platform),
            journal,
        }
    }

    pub fn start(&mut self) -> Result<i32, BootError> {
        self.engine
            .start(vec!["jshost".to_string(), "main.js".to_string()])
    }

    /// Start and expect a completed run
    pub fn exit_code(&mut self) -> i32 {
        self.start().expect("instance failed to boot")
    }

    pub fn state(&self) -> BootState {
        self.engine.state()
    }

    pub fn drain_report(&self) -> DrainReport {
        self.engine.drain_report().expect("drain loop never ran")
    }

    pub fn events(&self) -> Vec<Event> {
        self.journal.events()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.journal.count(event)
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.journal.contains(event)
    }

    fn position(&self, event: &Event) -> usize {
        self.journal
            .position(event)
            .unwrap_or_else(|| panic!("{:?} never happened in {:#?}", event, self.events()))
    }

    /// Assert the first `first` is journaled strictly before the first `second`
    pub fn assert_before(&self, first: &Event, second: &Event) {
        let (a, b) = (self.position(first), self.position(second));
        assert!(
            a < b,
            "expected {:?} (at {}) before {:?} (at {}) in {:#?}",
            first,
            a,
            second,
            b,
            self.events()
        );
    }

    pub fn assert_absent(&self, event: &Event) {
        assert!(
            !self.contains(event),
            "{:?} should not have happened in {:#?}",
            event,
            self.events()
        );
    }

    /// Events of one kind, in journal order, filtered by `keep`
    pub fn filtered(&self, keep: impl Fn(&Event) -> bool) -> Vec<Event> {
        self.events().into_iter().filter(|e| keep(e)).collect()
    }
}
