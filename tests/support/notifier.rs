use std::sync::Arc;

use parking_lot::Mutex;
use trailspread::port::{Event, Notifier};

/// Thread-safe event collector for notification assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }

    /// Event names other than per-quote chatter.
    pub fn lifecycle(&self) -> Vec<&'static str> {
        self.names()
            .into_iter()
            .filter(|name| *name != "quote_received" && *name != "quote_pair_evaluated")
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|n| **n == name).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &Event) {
        self.events.lock().push(event.name());
    }
}
