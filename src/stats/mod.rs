//! Statistics aggregation engine.
//!
//! Every analysis implements [`Stats`]: it is told when the originating
//! device changes, receives each key once, and writes its results when
//! the batch ends. [`StatsContainer`] broadcasts these events to any
//! number of analyses; [`CardStatsPercentageContainer`] turns a per-device
//! [`CardStats`] kind into cross-device percentage tables.

mod card;
mod container;
pub mod frequency;
mod percentage;
mod randomness;

pub use card::{CardInfo, CardStats, CardStatsFactory, SUMMARY_CARD, UNNAMED_CARD};
pub use container::StatsContainer;
pub use frequency::{BinningPolicy, Frequency, PercentageTable};
pub use percentage::CardStatsPercentageContainer;
pub use randomness::{
    is_turning_point, positive_difference_z, turning_point_z, CombinedStatistic,
    RandomnessReport, RandomnessStats, SequenceStatistic, SequenceWindow, WindowState,
};

use crate::key::KeyRecord;
use crate::output::ReportSink;

/// An analysis fed with a sequence of keys grouped by device.
pub trait Stats {
    /// Consumes one key of the current device.
    fn process(&mut self, key: &KeyRecord);

    /// Announces that subsequent keys come from device `icsn`.
    ///
    /// `expected_keys` is an optional hint of how many keys follow.
    fn change_card(&mut self, icsn: &str, expected_keys: Option<u64>);

    /// Writes the accumulated results once the batch has ended.
    fn print(&mut self, sink: &mut dyn ReportSink);
}
