//! Cross-device percentage tables.

use std::collections::BTreeSet;

use super::card::{CardStats, CardStatsFactory, SUMMARY_CARD, UNNAMED_CARD};
use super::frequency::{self, BinningPolicy, Frequency, PercentageTable};
use super::Stats;
use crate::key::KeyRecord;
use crate::output::{ReportSink, Table};

/// Holds one [`CardStats`] per device plus a summary over all of them,
/// and exports every distribution as a percentage table with one column
/// per device.
pub struct CardStatsPercentageContainer<F: CardStatsFactory> {
    factory: F,
    cards: Vec<F::Card>,
    active: Option<usize>,
    summary: F::Card,
    binning: BinningPolicy,
}

impl<F: CardStatsFactory> CardStatsPercentageContainer<F> {
    /// Creates a container with the default auto-binning policy.
    pub fn new(factory: F) -> Self {
        Self::with_binning(factory, BinningPolicy::default())
    }

    /// Creates a container with an explicit binning policy.
    pub fn with_binning(factory: F, binning: BinningPolicy) -> Self {
        let summary = factory.create(SUMMARY_CARD, None);
        Self {
            factory,
            cards: Vec::new(),
            active: None,
            summary,
            binning,
        }
    }

    /// Per-device instances in creation order.
    pub fn cards(&self) -> &[F::Card] {
        &self.cards
    }

    /// The instance that accumulates every key.
    pub fn summary(&self) -> &F::Card {
        &self.summary
    }

    fn table_name(&self, name: &str) -> String {
        match self.binning.fixed_width() {
            Some(width) => name.replace(".dat", &format!(".{}-binning.dat", width)),
            None => name.to_owned(),
        }
    }

    /// Union of the key ranges of one distribution over the columns.
    ///
    /// `located` pairs each column with the index of the distribution in
    /// that card, or `None` when the card does not have it.
    fn common_range(&self, located: &[(usize, Option<usize>)]) -> Option<(i64, i64)> {
        let mut range: Option<(i64, i64)> = None;
        for &(column, index) in located {
            let card = &self.cards[column];
            let found = index.and_then(|index| frequency::key_range(&card.data(index)));
            match found {
                Some((min, max)) => {
                    range = Some(match range {
                        Some((lo, hi)) => (lo.min(min), hi.max(max)),
                        None => (min, max),
                    });
                }
                None => tracing::debug!(
                    card = card.info().icsn(),
                    ?index,
                    "Distribution is empty"
                ),
            }
        }
        range
    }

    fn assemble(
        &self,
        index: usize,
        name: &str,
        columns: &[String],
        percentages: &[PercentageTable],
    ) -> Table {
        let keys: BTreeSet<i64> = percentages
            .iter()
            .flat_map(|table| table.keys().copied())
            .collect();

        let mut table = Table::new(self.table_name(name), columns.to_vec());
        for key in keys {
            let values = percentages
                .iter()
                .map(|table| table.get(&key).copied().unwrap_or(0.0))
                .collect();
            table.push_row(self.summary.label_for_key(index, key), values);
        }
        table
    }
}

impl<F: CardStatsFactory> Stats for CardStatsPercentageContainer<F> {
    fn change_card(&mut self, icsn: &str, expected_keys: Option<u64>) {
        self.cards.push(self.factory.create(icsn, expected_keys));
        self.active = Some(self.cards.len() - 1);
    }

    fn process(&mut self, key: &KeyRecord) {
        let active = match self.active {
            Some(active) => active,
            None => {
                self.change_card(UNNAMED_CARD, None);
                self.cards.len() - 1
            }
        };
        self.cards[active].process(key);
        self.summary.process(key);
    }

    fn print(&mut self, sink: &mut dyn ReportSink) {
        if self.summary.info().processed_keys() == 0 {
            return;
        }

        let columns: Vec<usize> = (0..self.cards.len())
            .filter(|&i| self.cards[i].info().processed_keys() > 0)
            .collect();
        for &column in &columns {
            self.cards[column].finish(sink);
        }

        let with_summary = columns.len() > 1;
        if with_summary {
            self.summary.finish(sink);
        }

        let mut names: Vec<String> = columns
            .iter()
            .map(|&i| self.cards[i].info().icsn().to_owned())
            .collect();
        if with_summary {
            names.push(self.summary.info().icsn().to_owned());
        }

        // Cards may expose a different set of distributions than the
        // summary (e.g. bit parts of shorter keys), so match by name.
        let card_names: Vec<Vec<String>> = columns
            .iter()
            .map(|&i| self.cards[i].data_names())
            .collect();

        for (index, name) in self.summary.data_names().iter().enumerate() {
            let located: Vec<(usize, Option<usize>)> = columns
                .iter()
                .zip(&card_names)
                .map(|(&column, names)| (column, names.iter().position(|n| n == name)))
                .collect();

            let Some((min, max)) = self.common_range(&located) else {
                tracing::debug!(table = %name, "No device has data, skipping");
                continue;
            };

            let mut percentages: Vec<PercentageTable> = located
                .iter()
                .map(|&(column, card_index)| match card_index {
                    Some(card_index) => {
                        self.cards[column].percentage_data(card_index, &self.binning, min, max)
                    }
                    None => self.binning.apply(&Frequency::new(), 0, min, max),
                })
                .collect();
            if with_summary {
                percentages.push(self.summary.percentage_data(index, &self.binning, min, max));
            }

            let table = self.assemble(index, name, &names, &percentages);
            if let Err(e) = sink.write_table(&table) {
                tracing::warn!(table = table.name(), error = %e, "Cannot generate statistics table");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::card::CardInfo;
    use crate::output::{MemorySink, OutputError};
    use num_bigint::BigUint;
    use std::borrow::Cow;

    /// Histogram of generation times, labels prefixed with "t".
    struct TimeCard {
        info: CardInfo,
        times: Frequency,
    }

    impl CardStats for TimeCard {
        fn info(&self) -> &CardInfo {
            &self.info
        }

        fn data_names(&self) -> Vec<String> {
            vec!["time.dat".into(), "never.dat".into(), "parity.dat".into()]
        }

        fn data(&self, index: usize) -> Cow<'_, Frequency> {
            match index {
                0 => Cow::Borrowed(&self.times),
                2 => {
                    let mut parity = Frequency::new();
                    for (&time, &count) in &self.times {
                        *parity.entry(time.rem_euclid(2)).or_insert(0) += count;
                    }
                    Cow::Owned(parity)
                }
                _ => Cow::Owned(Frequency::new()),
            }
        }

        fn label_for_key(&self, _index: usize, key: i64) -> String {
            format!("t{}", key)
        }

        fn process(&mut self, key: &KeyRecord) {
            self.info.record_key();
            frequency::increment(&mut self.times, key.time().unwrap_or(0));
        }
    }

    fn factory() -> impl Fn(&str, Option<u64>) -> TimeCard {
        |icsn, expected| TimeCard {
            info: CardInfo::new(icsn, expected),
            times: Frequency::new(),
        }
    }

    fn key(time: i64) -> KeyRecord {
        KeyRecord::new(
            BigUint::from(17u32),
            BigUint::from(3233u32),
            BigUint::from(61u32),
            BigUint::from(53u32),
        )
        .with_time(time)
    }

    #[test]
    fn test_empty_container_prints_nothing() {
        let mut container = CardStatsPercentageContainer::new(factory());
        let mut sink = MemorySink::new();
        container.print(&mut sink);
        assert!(sink.tables().is_empty());
    }

    #[test]
    fn test_implicit_unnamed_card() {
        let mut container = CardStatsPercentageContainer::new(factory());
        container.process(&key(1));

        assert_eq!(container.cards().len(), 1);
        assert_eq!(container.cards()[0].info().icsn(), UNNAMED_CARD);
        assert_eq!(container.summary().info().processed_keys(), 1);
    }

    #[test]
    fn test_single_card_has_no_summary_column() {
        let mut container = CardStatsPercentageContainer::new(factory());
        container.change_card("A", None);
        container.process(&key(1));
        container.process(&key(3));

        let mut sink = MemorySink::new();
        container.print(&mut sink);

        assert_eq!(sink.tables().len(), 2);
        let table = sink.table("time.dat").unwrap();
        assert_eq!(table.columns(), &["A".to_owned()]);
        assert_eq!(table.row("t1"), Some(&[50.0][..]));
        assert_eq!(table.row("t2"), Some(&[0.0][..]));
        assert_eq!(table.row("t3"), Some(&[50.0][..]));
    }

    #[test]
    fn test_multiple_cards_aligned_with_summary() {
        let mut container = CardStatsPercentageContainer::new(factory());
        container.change_card("A", None);
        container.process(&key(1));
        container.change_card("empty", None);
        container.change_card("B", Some(2));
        container.process(&key(4));
        container.process(&key(4));

        let mut sink = MemorySink::new();
        container.print(&mut sink);

        let table = sink.table("time.dat").unwrap();
        assert_eq!(table.columns(), &["A".to_owned(), "B".into(), SUMMARY_CARD.into()]);
        let labels: Vec<&str> = table.rows().iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["t1", "t2", "t3", "t4"]);

        let t1 = table.row("t1").unwrap();
        assert_eq!(t1[0], 100.0);
        assert_eq!(t1[1], 0.0);
        assert!((t1[2] - 100.0 / 3.0).abs() < 1e-9);
        let t4 = table.row("t4").unwrap();
        assert_eq!(t4[1], 100.0);
    }

    #[test]
    fn test_fixed_binning_renames_table() {
        let mut container =
            CardStatsPercentageContainer::with_binning(factory(), BinningPolicy::fixed(10));
        container.change_card("A", None);
        for t in [0, 5, 12, 25] {
            container.process(&key(t));
        }

        let mut sink = MemorySink::new();
        container.print(&mut sink);

        let table = sink.table("time.10-binning.dat").unwrap();
        let labels: Vec<&str> = table.rows().iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["t0", "t10", "t20"]);
        assert_eq!(table.row("t0"), Some(&[50.0][..]));
    }

    /// Rejects the first table, keeps the rest.
    #[derive(Default)]
    struct FailFirstSink {
        rejected: Vec<String>,
        inner: MemorySink,
    }

    impl ReportSink for FailFirstSink {
        fn write_table(&mut self, table: &Table) -> Result<(), OutputError> {
            if self.rejected.is_empty() {
                self.rejected.push(table.name().to_owned());
                let disk_full = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
                return Err(OutputError::io(table.name(), disk_full));
            }
            self.inner.write_table(table)
        }

        fn write_line(&mut self, line: &str) {
            self.inner.write_line(line);
        }
    }

    #[test]
    fn test_failed_table_does_not_stop_the_rest() {
        let mut container = CardStatsPercentageContainer::new(factory());
        container.change_card("A", None);
        for t in [1, 2, 3] {
            container.process(&key(t));
        }

        let mut sink = FailFirstSink::default();
        container.print(&mut sink);

        assert_eq!(sink.rejected, vec!["time.dat".to_owned()]);
        assert!(sink.inner.table("time.dat").is_none());
        let parity = sink.inner.table("parity.dat").unwrap();
        assert_eq!(parity.columns(), &["A".to_owned()]);
        let sum: f64 = parity.rows().iter().map(|(_, values)| values[0]).sum();
        assert!((sum - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_tables_are_reproducible() {
        let run = || {
            let mut container = CardStatsPercentageContainer::new(factory());
            container.change_card("A", None);
            for t in [3, 1, 4, 1, 5, 9, 2, 6] {
                container.process(&key(t));
            }
            container.change_card("B", None);
            for t in [2, 7, 1, 8, 2, 8] {
                container.process(&key(t));
            }
            let mut sink = MemorySink::new();
            container.print(&mut sink);
            sink
        };

        let first = run();
        let second = run();
        assert_eq!(first.tables().len(), second.tables().len());
        for (a, b) in first.tables().iter().zip(second.tables()) {
            assert_eq!(a.to_tsv(), b.to_tsv());
            for ((_, va), (_, vb)) in a.rows().iter().zip(b.rows()) {
                let bits_a: Vec<u64> = va.iter().map(|v| v.to_bits()).collect();
                let bits_b: Vec<u64> = vb.iter().map(|v| v.to_bits()).collect();
                assert_eq!(bits_a, bits_b);
            }
        }
    }
}
