//! Frequency distributions and their percentage normalization.
//!
//! Devices produce different numbers of keys and cover different key
//! ranges, so raw counts are converted into percentages aligned on a
//! common `[min, max)` domain before they are compared column by column.

use std::collections::BTreeMap;

/// Mapping from bucket key to the number of observations.
pub type Frequency = BTreeMap<i64, u64>;

/// Mapping from bucket key to a percentage in `[0, 100]`.
pub type PercentageTable = BTreeMap<i64, f64>;

/// Default upper bound on output rows before auto-binning kicks in.
pub const DEFAULT_MAX_ROWS: i64 = 200;

/// Largest number of buckets gap-filled into one binned distribution.
pub const MAX_FILLED_BUCKETS: i128 = 1 << 20;

/// Increments the count of `key` and returns the new count.
pub fn increment(freq: &mut Frequency, key: i64) -> u64 {
    let count = freq.entry(key).or_insert(0);
    *count += 1;
    *count
}

/// Inserts `value` for `key` unless the key is already present.
pub fn insert_if_absent(freq: &mut Frequency, key: i64, value: u64) {
    freq.entry(key).or_insert(value);
}

/// Sum of all counts.
pub fn total(freq: &Frequency) -> u64 {
    freq.values().sum()
}

/// Smallest and largest key, or `None` for an empty distribution.
pub fn key_range(freq: &Frequency) -> Option<(i64, i64)> {
    let (&min, _) = freq.first_key_value()?;
    let (&max, _) = freq.last_key_value()?;
    Some((min, max))
}

/// Converts counts into percentages of `total`.
///
/// With `fill_gaps`, every key of `[min, max)` missing from `freq` is
/// inserted with 0. A zero `total` yields 0 for every key.
pub fn to_percentage(
    freq: &Frequency,
    total: u64,
    min: i64,
    max: i64,
    fill_gaps: bool,
) -> PercentageTable {
    let mut percentage: PercentageTable = freq
        .iter()
        .map(|(&key, &count)| (key, percent(count, total)))
        .collect();

    if fill_gaps {
        let mut key = min;
        while key < max {
            percentage.entry(key).or_insert(0.0);
            key += 1;
        }
    }
    percentage
}

/// Groups keys into buckets of `width` starting at `min`, then converts
/// bucket sums into percentages of `total`.
///
/// A key lands in bucket `min + floor((key - min) / width) * width`.
/// Every bucket start in `[min, max)` is present in the result, unless
/// the domain spans more than [`MAX_FILLED_BUCKETS`] buckets.
pub fn to_percentage_binned(
    freq: &Frequency,
    width: i64,
    total: u64,
    min: i64,
    max: i64,
) -> PercentageTable {
    // i128 keeps the full i64 domain free of overflow
    let width = i128::from(width.max(1));
    let origin = i128::from(min);
    let mut buckets = Frequency::new();
    for (&key, &count) in freq {
        let bucket = origin + (i128::from(key) - origin).div_euclid(width) * width;
        *buckets.entry(saturate(bucket)).or_insert(0) += count;
    }

    let end = i128::from(max);
    let rows = (end - origin + width - 1).div_euclid(width);
    if rows > MAX_FILLED_BUCKETS {
        tracing::warn!(buckets = %rows, "Domain too wide, empty buckets left out");
    } else {
        let mut bucket = origin;
        while bucket < end {
            insert_if_absent(&mut buckets, saturate(bucket), 0);
            bucket += width;
        }
    }

    to_percentage(&buckets, total, min, max, false)
}

fn saturate(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (100.0 * count as f64) / total as f64
    }
}

/// How a container groups keys before computing percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinningPolicy {
    fixed_width: Option<i64>,
    max_rows: i64,
}

impl Default for BinningPolicy {
    fn default() -> Self {
        Self {
            fixed_width: None,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl BinningPolicy {
    /// Always bins with `width`; non-positive widths mean no fixed binning.
    pub fn fixed(width: i64) -> Self {
        Self {
            fixed_width: (width > 0).then_some(width),
            ..Self::default()
        }
    }

    /// Sets the row limit used for auto-binning.
    pub fn with_max_rows(mut self, max_rows: i64) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }

    /// The configured fixed width, if any.
    #[inline]
    pub fn fixed_width(&self) -> Option<i64> {
        self.fixed_width
    }

    /// Bucket width for the domain `[min, max]`, or `None` for no binning.
    pub fn width_for(&self, min: i64, max: i64) -> Option<i64> {
        if let Some(width) = self.fixed_width {
            return Some(width);
        }
        let span = i128::from(max) - i128::from(min);
        let max_rows = i128::from(self.max_rows);
        (span > max_rows).then(|| saturate(span / max_rows))
    }

    /// Applies the policy to one distribution.
    pub fn apply(&self, freq: &Frequency, total: u64, min: i64, max: i64) -> PercentageTable {
        match self.width_for(min, max) {
            Some(width) => to_percentage_binned(freq, width, total, min, max),
            None => to_percentage(freq, total, min, max, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Frequency {
        [(10, 0), (12, 2), (13, 1), (23, 21), (32, 11)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_percentage_sums_to_hundred() {
        let freq = sample();
        let table = to_percentage(&freq, total(&freq), 10, 32, true);

        for (key, count) in &freq {
            assert!((table[key] - *count as f64 * 100.0 / 35.0).abs() < 1e-4);
        }
        let sum: f64 = table.values().sum();
        assert!((sum - 100.0).abs() < 1e-4);
        // gap filled
        assert_eq!(table[&11], 0.0);
        assert_eq!(table.len(), 23);
    }

    #[test]
    fn test_gap_filling_can_be_suppressed() {
        let freq = sample();
        let table = to_percentage(&freq, 35, 10, 32, false);
        assert_eq!(table.len(), freq.len());
    }

    #[test]
    fn test_zero_total() {
        let freq = sample();
        let table = to_percentage(&freq, 0, 10, 32, false);
        assert!(table.values().all(|&v| v == 0.0));
    }

    #[test]
    fn test_binning() {
        let freq = sample();
        let table = to_percentage_binned(&freq, 10, 35, 10, 32);

        assert_eq!(table.len(), 3);
        assert!((table[&10] - 3.0 * 100.0 / 35.0).abs() < 1e-4);
        assert!((table[&20] - 21.0 * 100.0 / 35.0).abs() < 1e-4);
        assert!((table[&30] - 11.0 * 100.0 / 35.0).abs() < 1e-4);
    }

    #[test]
    fn test_binning_with_wider_domain() {
        let freq = sample();
        let table = to_percentage_binned(&freq, 5, 35, 6, 40);

        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![6, 11, 16, 21, 26, 31, 36]);
        assert!((table[&11] - 3.0 * 100.0 / 35.0).abs() < 1e-4);
        assert_eq!(table[&16], 0.0);
        assert!((table[&21] - 21.0 * 100.0 / 35.0).abs() < 1e-4);
        assert!((table[&31] - 11.0 * 100.0 / 35.0).abs() < 1e-4);
    }

    #[test]
    fn test_increment_and_insert() {
        let mut freq = sample();
        assert_eq!(increment(&mut freq, 10), 1);
        assert_eq!(increment(&mut freq, 11), 1);
        assert_eq!(increment(&mut freq, 11), 2);

        insert_if_absent(&mut freq, 10, 7);
        insert_if_absent(&mut freq, 99, 7);
        assert_eq!(freq[&10], 1);
        assert_eq!(freq[&99], 7);
    }

    #[test]
    fn test_key_range() {
        assert_eq!(key_range(&sample()), Some((10, 32)));
        assert_eq!(key_range(&Frequency::new()), None);
    }

    #[test]
    fn test_auto_binning_policy() {
        let policy = BinningPolicy::default();
        assert_eq!(policy.width_for(0, 200), None);
        assert_eq!(policy.width_for(0, 201), Some(1));
        assert_eq!(policy.width_for(0, 1000), Some(5));

        let fixed = BinningPolicy::fixed(37);
        assert_eq!(fixed.width_for(0, 10), Some(37));
        assert_eq!(BinningPolicy::fixed(0).fixed_width(), None);
    }

    #[test]
    fn test_binning_at_the_ends_of_i64() {
        let high: Frequency = [(0, 1), (i64::MAX, 1)].into_iter().collect();
        let table = BinningPolicy::default().apply(&high, 2, 0, i64::MAX);
        assert!(table.len() <= 202);
        assert!((table.values().sum::<f64>() - 100.0).abs() < 1e-4);
        assert_eq!(table[&0], 50.0);

        let low: Frequency = [(i64::MIN, 1), (0, 1)].into_iter().collect();
        let table = BinningPolicy::default().apply(&low, 2, i64::MIN, 0);
        assert!(table.len() <= 202);
        assert!((table.values().sum::<f64>() - 100.0).abs() < 1e-4);
        assert_eq!(table[&i64::MIN], 50.0);

        let policy = BinningPolicy::default().with_max_rows(1);
        assert_eq!(policy.width_for(i64::MIN, i64::MAX), Some(i64::MAX));
    }

    #[test]
    fn test_fixed_width_over_huge_domain() {
        let freq: Frequency = [(i64::MIN, 1), (0, 3)].into_iter().collect();
        let table = BinningPolicy::fixed(10).apply(&freq, 4, i64::MIN, 0);
        // only occupied buckets, no gap filling
        assert_eq!(table.len(), 2);
        assert_eq!(table[&i64::MIN], 25.0);
        assert!((table.values().sum::<f64>() - 100.0).abs() < 1e-4);
    }

    proptest! {
        #[test]
        fn prop_percentages_sum_to_hundred(
            entries in prop::collection::btree_map(-500i64..500, 1u64..10_000, 1..64)
        ) {
            let freq: Frequency = entries;
            let (min, max) = key_range(&freq).unwrap();
            let table = to_percentage(&freq, total(&freq), min, max, true);
            let sum: f64 = table.values().sum();
            prop_assert!((sum - 100.0).abs() < 1e-4);
            prop_assert!(table.values().all(|&v| (0.0..=100.0).contains(&v)));
        }

        #[test]
        fn prop_binned_percentages_sum_to_hundred(
            entries in prop::collection::btree_map(0i64..5_000, 1u64..1_000, 1..64),
            width in 1i64..300,
        ) {
            let freq: Frequency = entries;
            let (min, max) = key_range(&freq).unwrap();
            let table = to_percentage_binned(&freq, width, total(&freq), min, max);
            let sum: f64 = table.values().sum();
            prop_assert!((sum - 100.0).abs() < 1e-4);
        }

        #[test]
        fn prop_bucket_count_and_alignment(
            keys in prop::collection::btree_set(0i64..1_000, 1..50),
            min in -100i64..0,
            extra in 1i64..500,
            width in 1i64..100,
        ) {
            let max = 1_000 + extra;
            let freq: Frequency = keys.into_iter().map(|k| (k, 1)).collect();
            let table = to_percentage_binned(&freq, width, total(&freq), min, max);

            let expected = (max - min + width - 1) / width;
            prop_assert_eq!(table.len() as i64, expected);
            for key in table.keys() {
                prop_assert_eq!((key - min) % width, 0);
            }
        }
    }
}
