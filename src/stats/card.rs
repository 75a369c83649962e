//! Per-device accumulator.

use std::borrow::Cow;

use super::frequency::{self, BinningPolicy, Frequency, PercentageTable};
use crate::key::KeyRecord;
use crate::output::ReportSink;

/// Identity used when keys arrive before any device was announced.
pub const UNNAMED_CARD: &str = "NotDefinedICSN";

/// Identity of the instance that accumulates every device.
pub const SUMMARY_CARD: &str = "Summary";

/// Bookkeeping shared by every [`CardStats`] kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    icsn: String,
    processed_keys: u64,
    expected_keys: Option<u64>,
}

impl CardInfo {
    /// Creates the info of device `icsn` with no keys yet.
    pub fn new(icsn: &str, expected_keys: Option<u64>) -> Self {
        Self {
            icsn: icsn.to_owned(),
            processed_keys: 0,
            expected_keys,
        }
    }

    /// Device identity (IC serial number or file stem).
    #[inline]
    pub fn icsn(&self) -> &str {
        &self.icsn
    }

    /// Keys that contributed to this card's distributions.
    #[inline]
    pub fn processed_keys(&self) -> u64 {
        self.processed_keys
    }

    /// Optional hint given when the card was created.
    #[inline]
    pub fn expected_keys(&self) -> Option<u64> {
        self.expected_keys
    }

    /// Counts one more processed key.
    #[inline]
    pub fn record_key(&mut self) {
        self.processed_keys += 1;
    }
}

/// One device's view of an analysis: an ordered list of named frequency
/// distributions updated key by key.
pub trait CardStats {
    /// Identity and key counters.
    fn info(&self) -> &CardInfo;

    /// Output names of the distributions, in index order.
    fn data_names(&self) -> Vec<String>;

    /// Raw distribution at `index`; empty for an unknown index.
    fn data(&self, index: usize) -> Cow<'_, Frequency>;

    /// Denominator used for percentages of distribution `index`.
    fn total_for(&self, index: usize) -> u64 {
        frequency::total(&self.data(index))
    }

    /// Row label for `key` in distribution `index`.
    fn label_for_key(&self, _index: usize, key: i64) -> String {
        key.to_string()
    }

    /// Updates the distributions with one key.
    fn process(&mut self, key: &KeyRecord);

    /// Called once before the card's distributions are exported.
    fn finish(&mut self, _sink: &mut dyn ReportSink) {}

    /// Percentages of distribution `index` aligned on `[min, max]`.
    fn percentage_data(
        &self,
        index: usize,
        policy: &BinningPolicy,
        min: i64,
        max: i64,
    ) -> PercentageTable {
        policy.apply(&self.data(index), self.total_for(index), min, max)
    }
}

/// Builds a fresh [`CardStats`] instance for a device.
pub trait CardStatsFactory {
    type Card: CardStats;

    fn create(&self, icsn: &str, expected_keys: Option<u64>) -> Self::Card;
}

impl<C, F> CardStatsFactory for F
where
    C: CardStats,
    F: Fn(&str, Option<u64>) -> C,
{
    type Card = C;

    fn create(&self, icsn: &str, expected_keys: Option<u64>) -> C {
        self(icsn, expected_keys)
    }
}
