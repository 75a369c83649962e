//! Fan-out over independent analyses.

use super::Stats;
use crate::key::KeyRecord;
use crate::output::ReportSink;

/// Broadcasts every event to its members in registration order.
///
/// Members never see each other, so any subset of analyses can be
/// assembled without touching the ingestion code.
#[derive(Default)]
pub struct StatsContainer {
    members: Vec<Box<dyn Stats>>,
}

impl StatsContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an analysis.
    pub fn add(&mut self, stats: impl Stats + 'static) {
        self.members.push(Box::new(stats));
    }

    /// Number of registered analyses.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Stats for StatsContainer {
    fn process(&mut self, key: &KeyRecord) {
        for member in &mut self.members {
            member.process(key);
        }
    }

    fn change_card(&mut self, icsn: &str, expected_keys: Option<u64>) {
        for member in &mut self.members {
            member.change_card(icsn, expected_keys);
        }
    }

    fn print(&mut self, sink: &mut dyn ReportSink) {
        for member in &mut self.members {
            member.print(sink);
        }
    }
}
