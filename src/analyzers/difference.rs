//! Distance between the two primes of a key.

use std::borrow::Cow;
use std::cmp::Ordering;

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::key::KeyRecord;
use crate::output::ReportSink;
use crate::stats::frequency::{increment, insert_if_absent};
use crate::stats::{CardInfo, CardStats, Frequency};

const P_MINUS_Q: usize = 0;
const ORDER: usize = 1;
const BIT_LENGTH: usize = 2;

/// Tracks |p - q| relative to the prime size, which prime is larger and
/// the bit length of the difference.
#[derive(Debug)]
pub struct PrimeDifferenceStats {
    info: CardInfo,
    distributions: [Frequency; 3],
}

impl PrimeDifferenceStats {
    /// Creates the statistics of device `icsn`.
    pub fn new(icsn: &str, expected_keys: Option<u64>) -> Self {
        Self {
            info: CardInfo::new(icsn, expected_keys),
            distributions: Default::default(),
        }
    }
}

/// `floor(value * 100 / 2^bits)`.
fn percent_of_power(value: &BigUint, bits: u64) -> i64 {
    ((value * 100u32) >> bits).to_i64().unwrap_or(i64::MAX)
}

impl CardStats for PrimeDifferenceStats {
    fn info(&self) -> &CardInfo {
        &self.info
    }

    fn data_names(&self) -> Vec<String> {
        vec![
            "p_minus_q.dat".into(),
            "p_greater_then_q.dat".into(),
            "prime_difference_bitlength.dat".into(),
        ]
    }

    fn data(&self, index: usize) -> Cow<'_, Frequency> {
        self.distributions
            .get(index)
            .map_or_else(|| Cow::Owned(Frequency::new()), Cow::Borrowed)
    }

    fn label_for_key(&self, index: usize, key: i64) -> String {
        match (index, key) {
            (ORDER, -1) => "p < q".into(),
            (ORDER, 0) => "p == q".into(),
            (ORDER, 1) => "p > q".into(),
            _ => key.to_string(),
        }
    }

    fn process(&mut self, key: &KeyRecord) {
        if !key.is_valid() {
            return;
        }
        self.info.record_key();

        let difference = key.prime_difference();
        let bits = key.p().bits().max(key.q().bits());
        let order = match key.p().cmp(key.q()) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        };

        increment(&mut self.distributions[P_MINUS_Q], percent_of_power(&difference, bits));
        increment(&mut self.distributions[ORDER], order);
        increment(&mut self.distributions[BIT_LENGTH], difference.bits() as i64);
    }

    fn finish(&mut self, _sink: &mut dyn ReportSink) {
        for order in -1..=1 {
            insert_if_absent(&mut self.distributions[ORDER], order, 0);
        }
        insert_if_absent(&mut self.distributions[BIT_LENGTH], 0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;

    fn key(p: u64, q: u64) -> KeyRecord {
        KeyRecord::new(
            BigUint::from(17u32),
            BigUint::from(p * q),
            BigUint::from(p),
            BigUint::from(q),
        )
    }

    #[test]
    fn test_textbook_difference() {
        let mut stats = PrimeDifferenceStats::new("A", None);
        stats.process(&key(61, 53));

        // 8 * 100 / 64
        assert_eq!(stats.data(P_MINUS_Q).get(&12), Some(&1));
        assert_eq!(stats.data(ORDER).get(&1), Some(&1));
        assert_eq!(stats.data(BIT_LENGTH).get(&4), Some(&1));
    }

    #[test]
    fn test_invalid_keys_are_ignored() {
        let mut stats = PrimeDifferenceStats::new("A", None);
        stats.process(&KeyRecord::new(
            BigUint::from(17u32),
            BigUint::from(3234u32),
            BigUint::from(61u32),
            BigUint::from(53u32),
        ));
        assert_eq!(stats.info().processed_keys(), 0);
        assert!(stats.data(ORDER).is_empty());
    }

    #[test]
    fn test_finish_fills_order_buckets() {
        let mut stats = PrimeDifferenceStats::new("A", None);
        stats.process(&key(53, 61));
        stats.finish(&mut MemorySink::new());

        let order = stats.data(ORDER);
        assert_eq!(order.keys().copied().collect::<Vec<_>>(), vec![-1, 0, 1]);
        assert_eq!(order[&-1], 1);
        assert_eq!(stats.data(BIT_LENGTH).get(&0), Some(&0));
        assert_eq!(stats.label_for_key(ORDER, -1), "p < q");
        assert_eq!(stats.label_for_key(P_MINUS_Q, 12), "12");
    }
}
