//! Status announcements for assistive output
//!
//! Commands report progress ("Loading Sea Otter…", "3 results for kelp")
//! through an [`Announcer`] so the same messages can go to a screen reader
//! bridge, the log, or a test buffer.

use std::sync::Mutex;

use tracing::info;

/// How urgently an announcement should interrupt the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Politeness {
    /// Read when the listener is idle
    Polite,
    /// Read immediately, interrupting current speech
    Assertive,
}

impl Politeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Politeness::Polite => "polite",
            Politeness::Assertive => "assertive",
        }
    }
}

/// Receives status messages
pub trait Announcer: Send + Sync {
    fn announce(&self, message: &str, politeness: Politeness);
}

/// Emits announcements as tracing events on the `seahere::announce` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, message: &str, politeness: Politeness) {
        info!(target: "seahere::announce", politeness = politeness.as_str(), "{}", message);
    }
}

/// Records announcements in memory
#[derive(Debug, Default)]
pub struct MemoryAnnouncer {
    messages: Mutex<Vec<(String, Politeness)>>,
}

impl MemoryAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announcements received so far, oldest first
    pub fn messages(&self) -> Vec<(String, Politeness)> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Announcer for MemoryAnnouncer {
    fn announce(&self, message: &str, politeness: Politeness) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push((message.to_string(), politeness));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_announcer_records_in_order() {
        let announcer = MemoryAnnouncer::new();
        announcer.announce("Loading Vaquita", Politeness::Polite);
        announcer.announce("Vaquita not found", Politeness::Assertive);

        assert_eq!(
            announcer.messages(),
            vec![
                ("Loading Vaquita".to_string(), Politeness::Polite),
                ("Vaquita not found".to_string(), Politeness::Assertive),
            ]
        );
    }

    #[test]
    fn test_politeness_labels() {
        assert_eq!(Politeness::Polite.as_str(), "polite");
        assert_eq!(Politeness::Assertive.as_str(), "assertive");
    }

    #[test]
    fn test_log_announcer_does_not_panic_without_subscriber() {
        LogAnnouncer.announce("Loaded", Politeness::Polite);
    }
}
