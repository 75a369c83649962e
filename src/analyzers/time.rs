//! Key generation time distribution.

use std::borrow::Cow;

use crate::key::KeyRecord;
use crate::output::ReportSink;
use crate::stats::frequency::{increment, insert_if_absent};
use crate::stats::{CardInfo, CardStats, Frequency};

/// Histogram of generation times in milliseconds.
///
/// Only keys that carry a generation time are counted.
#[derive(Debug)]
pub struct TimeStats {
    info: CardInfo,
    times: Frequency,
}

impl TimeStats {
    /// Creates the statistics of device `icsn`.
    pub fn new(icsn: &str, expected_keys: Option<u64>) -> Self {
        Self {
            info: CardInfo::new(icsn, expected_keys),
            times: Frequency::new(),
        }
    }
}

impl CardStats for TimeStats {
    fn info(&self) -> &CardInfo {
        &self.info
    }

    fn data_names(&self) -> Vec<String> {
        vec!["time.dat".into()]
    }

    fn data(&self, index: usize) -> Cow<'_, Frequency> {
        match index {
            0 => Cow::Borrowed(&self.times),
            _ => Cow::Owned(Frequency::new()),
        }
    }

    fn process(&mut self, key: &KeyRecord) {
        if !key.is_valid() {
            return;
        }
        match key.time() {
            Some(time) => {
                self.info.record_key();
                increment(&mut self.times, time);
            }
            None => tracing::debug!(card = self.info.icsn(), "Key without generation time"),
        }
    }

    fn finish(&mut self, _sink: &mut dyn ReportSink) {
        insert_if_absent(&mut self.times, 0, 0);
    }
}
