//! Validity, uniqueness and private exponent size.

use std::borrow::Cow;
use std::collections::HashSet;

use num_bigint::BigUint;

use crate::key::KeyRecord;
use crate::output::ReportSink;
use crate::stats::frequency::{increment, insert_if_absent};
use crate::stats::{CardInfo, CardStats, Frequency};

const VALIDITY: usize = 0;
const UNIQUENESS: usize = 1;
const UNIQUENESS_Q: usize = 3;
const EXPONENT: usize = 4;

/// Bucket recorded when the private exponent does not exist.
const NO_PRIVATE_EXPONENT: i64 = -1;

fn fingerprint(n: &BigUint) -> [u8; 32] {
    *blake3::hash(&n.to_bytes_be()).as_bytes()
}

/// Counts valid keys, keys whose primes were never seen before on the
/// same device and the bit length of the private exponent.
///
/// Unlike the other analyses, invalid keys are counted too.
#[derive(Debug)]
pub struct PrimeBaseStats {
    info: CardInfo,
    distributions: [Frequency; 5],
    seen_p: HashSet<[u8; 32]>,
    seen_q: HashSet<[u8; 32]>,
    invalid: u64,
}

impl PrimeBaseStats {
    /// Creates the statistics of device `icsn`.
    pub fn new(icsn: &str, expected_keys: Option<u64>) -> Self {
        Self {
            info: CardInfo::new(icsn, expected_keys),
            distributions: Default::default(),
            seen_p: HashSet::new(),
            seen_q: HashSet::new(),
            invalid: 0,
        }
    }

    /// Number of invalid keys seen.
    pub fn invalid_keys(&self) -> u64 {
        self.invalid
    }
}

impl CardStats for PrimeBaseStats {
    fn info(&self) -> &CardInfo {
        &self.info
    }

    fn data_names(&self) -> Vec<String> {
        [
            "validity.dat",
            "uniqueness.dat",
            "uniqueness.p.dat",
            "uniqueness.q.dat",
            "private.exponent.bitlength.dat",
        ]
        .map(String::from)
        .to_vec()
    }

    fn data(&self, index: usize) -> Cow<'_, Frequency> {
        match self.distributions.get(index) {
            Some(freq) => Cow::Borrowed(freq),
            None => Cow::Owned(Frequency::new()),
        }
    }

    fn label_for_key(&self, index: usize, key: i64) -> String {
        match (index, key) {
            (VALIDITY, 0) => "Invalid".into(),
            (VALIDITY, _) => "Valid".into(),
            (UNIQUENESS..=UNIQUENESS_Q, 0) => "Non-unique".into(),
            (UNIQUENESS..=UNIQUENESS_Q, _) => "Unique".into(),
            (EXPONENT, NO_PRIVATE_EXPONENT) => "Invalid".into(),
            _ => key.to_string(),
        }
    }

    fn process(&mut self, key: &KeyRecord) {
        self.info.record_key();

        let unique_p = self.seen_p.insert(fingerprint(key.p()));
        let unique_q = self.seen_q.insert(fingerprint(key.q()));
        let valid = key.is_valid();
        if !valid {
            self.invalid += 1;
        }

        let [validity, unique, unique_p_freq, unique_q_freq, exponent] = &mut self.distributions;
        increment(validity, valid as i64);
        increment(unique, (unique_p && unique_q) as i64);
        increment(unique_p_freq, unique_p as i64);
        increment(unique_q_freq, unique_q as i64);

        let bucket = match key.private_exponent() {
            Ok(d) => d.bits() as i64,
            Err(e) => {
                tracing::debug!(error = %e, "No private exponent");
                NO_PRIVATE_EXPONENT
            }
        };
        increment(exponent, bucket);
    }

    fn finish(&mut self, sink: &mut dyn ReportSink) {
        for freq in &mut self.distributions[VALIDITY..=UNIQUENESS_Q] {
            insert_if_absent(freq, 0, 0);
            insert_if_absent(freq, 1, 0);
        }

        sink.write_line(&format!(
            "{}: {} keys, {} invalid",
            self.info.icsn(),
            self.info.processed_keys(),
            self.invalid
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;

    fn key(e: u64, n: u64, p: u64, q: u64) -> KeyRecord {
        KeyRecord::new(
            BigUint::from(e),
            BigUint::from(n),
            BigUint::from(p),
            BigUint::from(q),
        )
    }

    #[test]
    fn test_counts_valid_and_invalid() {
        let mut stats = PrimeBaseStats::new("A", None);
        stats.process(&key(17, 3233, 61, 53));
        stats.process(&key(17, 3234, 61, 53));

        assert_eq!(stats.info().processed_keys(), 2);
        assert_eq!(stats.invalid_keys(), 1);
        let validity = stats.data(VALIDITY);
        assert_eq!(validity.get(&1), Some(&1));
        assert_eq!(validity.get(&0), Some(&1));
    }

    #[test]
    fn test_uniqueness() {
        let mut stats = PrimeBaseStats::new("A", None);
        stats.process(&key(17, 3233, 61, 53));
        stats.process(&key(17, 3233, 61, 53));
        stats.process(&key(17, 3431, 47, 73));
        stats.process(&key(17, 2867, 61, 47));

        assert_eq!(stats.data(UNIQUENESS).get(&1), Some(&2));
        assert_eq!(stats.data(UNIQUENESS).get(&0), Some(&2));
        assert_eq!(stats.data(2).get(&1), Some(&2));
        assert_eq!(stats.data(UNIQUENESS_Q).get(&1), Some(&3));
    }

    #[test]
    fn test_private_exponent_bucket() {
        let mut stats = PrimeBaseStats::new("A", None);
        // d = 2753 has 12 bits
        stats.process(&key(17, 3233, 61, 53));
        // gcd(3, 3120) = 3
        stats.process(&key(3, 3233, 61, 53));

        let exponent = stats.data(EXPONENT);
        assert_eq!(exponent.get(&12), Some(&1));
        assert_eq!(exponent.get(&NO_PRIVATE_EXPONENT), Some(&1));
        assert_eq!(stats.label_for_key(EXPONENT, -1), "Invalid");
        assert_eq!(stats.label_for_key(EXPONENT, 12), "12");
    }

    #[test]
    fn test_finish_fills_buckets_and_reports() {
        let mut stats = PrimeBaseStats::new("A", None);
        stats.process(&key(17, 3233, 61, 53));

        let mut sink = MemorySink::new();
        stats.finish(&mut sink);

        assert_eq!(stats.data(VALIDITY).get(&0), Some(&0));
        assert_eq!(stats.data(2).get(&0), Some(&0));
        assert_eq!(sink.lines(), &["A: 1 keys, 0 invalid".to_owned()]);
        assert_eq!(stats.label_for_key(VALIDITY, 0), "Invalid");
        assert_eq!(stats.label_for_key(2, 1), "Unique");
    }
}
