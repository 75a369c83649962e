//! Smoothness of p - 1 and q - 1.
//!
//! Primes whose predecessor splits into small factors are exposed to
//! Pollard's p - 1 method. For every key, p - 1 and q - 1 are
//! trial-divided by all primes below a bound B and the smooth part is
//! measured.

use std::borrow::Cow;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::key::{is_probable_prime, KeyRecord, PrimeTable, DEFAULT_PRIME_ROUNDS};
use crate::output::ReportSink;
use crate::stats::frequency::{increment, insert_if_absent};
use crate::stats::{CardInfo, CardStats, Frequency};

/// Default trial-division bound B.
pub const DEFAULT_SMOOTH_BOUND: u32 = 100_000;

/// Result of trial-dividing one number by all primes below B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smoothness {
    /// Prime factors below B, with multiplicity.
    pub small_factor_count: u64,
    /// Bit length of the product of those factors.
    pub smooth_part_bits: u64,
    /// The number is B-smooth.
    pub fully_smooth: bool,
    /// What remains after removing small factors is a single prime.
    pub single_large_factor: bool,
}

/// Trial division against a shared prime table.
#[derive(Debug, Clone)]
pub struct SmoothnessAnalyzer {
    primes: Arc<PrimeTable>,
    rounds: u32,
}

impl SmoothnessAnalyzer {
    /// Creates an analyzer over `primes` using `rounds` Miller-Rabin rounds for the residue.
    pub fn new(primes: Arc<PrimeTable>, rounds: u32) -> Self {
        Self {
            primes,
            rounds: rounds.max(1),
        }
    }

    /// Sieves a table for `bound` with the default primality rounds.
    pub fn with_bound(bound: u32) -> Self {
        Self::new(Arc::new(PrimeTable::new(bound)), DEFAULT_PRIME_ROUNDS)
    }

    /// Trial-division bound B.
    pub fn bound(&self) -> u32 {
        self.primes.bound()
    }

    /// Measures the smooth part of `m`.
    pub fn analyze(&self, m: &BigUint) -> Smoothness {
        if m.is_zero() {
            return Smoothness::default();
        }

        let mut residual = m.clone();
        let mut smooth_part = BigUint::one();
        let mut small_factor_count = 0;

        for &prime in self.primes.primes() {
            if residual.is_one() {
                break;
            }
            while (&residual % prime).is_zero() {
                residual /= prime;
                smooth_part *= prime;
                small_factor_count += 1;
            }
        }

        Smoothness {
            small_factor_count,
            smooth_part_bits: smooth_part.bits(),
            fully_smooth: residual.is_one(),
            single_large_factor: is_probable_prime(&residual, self.rounds),
        }
    }
}

const FACTOR_COUNT: usize = 0;
const SMOOTH_LENGTH: usize = 3;
const TALLY: usize = 6;

/// Tally bucket of B-smooth numbers.
const SMOOTH: i64 = 0;
/// Tally bucket of numbers with exactly one factor above B.
const ONE_LARGE_FACTOR: i64 = 1;

/// Smoothness distributions of p - 1 and q - 1, pooled and per prime.
#[derive(Debug)]
pub struct PrimeStrengthStats {
    info: CardInfo,
    analyzer: SmoothnessAnalyzer,
    distributions: [Frequency; 7],
}

impl PrimeStrengthStats {
    /// Creates the statistics of device `icsn` using `analyzer`.
    pub fn new(icsn: &str, expected_keys: Option<u64>, analyzer: SmoothnessAnalyzer) -> Self {
        Self {
            info: CardInfo::new(icsn, expected_keys),
            analyzer,
            distributions: Default::default(),
        }
    }

    /// Records one number; `offset` is 1 for p and 2 for q.
    fn record(&mut self, m: &BigUint, offset: usize) {
        let smoothness = self.analyzer.analyze(m);
        let count = smoothness.small_factor_count as i64;
        let bits = smoothness.smooth_part_bits as i64;

        increment(&mut self.distributions[FACTOR_COUNT], count);
        increment(&mut self.distributions[FACTOR_COUNT + offset], count);
        increment(&mut self.distributions[SMOOTH_LENGTH], bits);
        increment(&mut self.distributions[SMOOTH_LENGTH + offset], bits);

        if smoothness.fully_smooth {
            increment(&mut self.distributions[TALLY], SMOOTH);
        }
        if smoothness.single_large_factor {
            increment(&mut self.distributions[TALLY], ONE_LARGE_FACTOR);
        }
    }
}

impl CardStats for PrimeStrengthStats {
    fn info(&self) -> &CardInfo {
        &self.info
    }

    fn data_names(&self) -> Vec<String> {
        [
            "small_factor_count.dat",
            "small_factor_count.p.dat",
            "small_factor_count.q.dat",
            "smooth_part_lengths.dat",
            "smooth_part_lengths.p.dat",
            "smooth_part_lengths.q.dat",
            "smooth_and_factored_number_count.dat",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect()
    }

    fn data(&self, index: usize) -> Cow<'_, Frequency> {
        self.distributions
            .get(index)
            .map_or_else(|| Cow::Owned(Frequency::new()), Cow::Borrowed)
    }

    fn label_for_key(&self, index: usize, key: i64) -> String {
        match (index, key) {
            (TALLY, SMOOTH) => format!("{}-smooth", self.analyzer.bound()),
            (TALLY, ONE_LARGE_FACTOR) => "only one bigger factor".into(),
            _ => key.to_string(),
        }
    }

    fn process(&mut self, key: &KeyRecord) {
        if !key.is_valid() {
            return;
        }
        self.info.record_key();

        self.record(&(key.p() - 1u32), 1);
        self.record(&(key.q() - 1u32), 2);
    }

    fn finish(&mut self, _sink: &mut dyn ReportSink) {
        for freq in &mut self.distributions[..TALLY] {
            insert_if_absent(freq, 0, 0);
        }
        insert_if_absent(&mut self.distributions[TALLY], SMOOTH, 0);
        insert_if_absent(&mut self.distributions[TALLY], ONE_LARGE_FACTOR, 0);
    }
}
