//! Concrete per-device analyses.
//!
//! Each kind implements [`CardStats`](crate::stats::CardStats) and is
//! turned into cross-device tables by wrapping a factory closure in a
//! [`CardStatsPercentageContainer`](crate::stats::CardStatsPercentageContainer).

mod base;
mod bits;
mod bytes;
mod difference;
mod strength;
mod time;

pub use base::PrimeBaseStats;
pub use bits::{AllBitsStats, BITS_IN_PART};
pub use bytes::{AllBytesStats, ByteSelection, VALUES_IN_PART};
pub use difference::PrimeDifferenceStats;
pub use strength::{PrimeStrengthStats, Smoothness, SmoothnessAnalyzer, DEFAULT_SMOOTH_BOUND};
pub use time::TimeStats;

use std::borrow::Cow;

use num_bigint::BigUint;

use crate::key::KeyRecord;
use crate::stats::Frequency;

/// Which number a positional distribution is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimeSource {
    /// p and q pooled together.
    Primes,
    /// First prime only.
    P,
    /// Second prime only.
    Q,
    /// The modulus n.
    Modulus,
}

impl PrimeSource {
    /// Output order of the sources.
    pub const ALL: [PrimeSource; 4] = [Self::Primes, Self::P, Self::Q, Self::Modulus];

    /// Table name of part `part` (zero based) for a positional `unit`
    /// such as `bits` or `bytes`.
    pub fn table_name(self, unit: &str, part: usize) -> String {
        let part = part + 1;
        match self {
            Self::Primes => format!("primes_{}.part_{}.dat", unit, part),
            Self::P => format!("primes_{}.p.part_{}.dat", unit, part),
            Self::Q => format!("primes_{}.q.part_{}.dat", unit, part),
            Self::Modulus => format!("modulus_{}.part_{}.dat", unit, part),
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// One positional distribution per [`PrimeSource`], split into parts of
/// a fixed number of keys.
#[derive(Debug, Clone, Default)]
pub(crate) struct PartMaps {
    maps: [Frequency; 4],
}

impl PartMaps {
    pub(crate) fn get(&self, source: PrimeSource) -> &Frequency {
        &self.maps[source.slot()]
    }

    pub(crate) fn get_mut(&mut self, source: PrimeSource) -> &mut Frequency {
        &mut self.maps[source.slot()]
    }

    /// Number of parts of `part_size` keys, counting a trailing partial one.
    pub(crate) fn parts(&self, source: PrimeSource, part_size: i64) -> usize {
        let len = self.get(source).len() as i64;
        ((len + part_size - 1) / part_size) as usize
    }

    /// Keys of `part` restricted to `[part * size, (part + 1) * size)`.
    pub(crate) fn part(&self, source: PrimeSource, part: usize, part_size: i64) -> Cow<'_, Frequency> {
        let from = part as i64 * part_size;
        let to = from + part_size;
        Cow::Owned(
            self.get(source)
                .range(from..to)
                .map(|(&k, &v)| (k, v))
                .collect(),
        )
    }
}

/// Calls `f` with every (source, number) pair a key contributes: p and q
/// to the pooled distribution, each prime to its own and the modulus.
pub(crate) fn for_each_source(key: &KeyRecord, mut f: impl FnMut(PrimeSource, &BigUint)) {
    f(PrimeSource::Primes, key.p());
    f(PrimeSource::Primes, key.q());
    f(PrimeSource::P, key.p());
    f(PrimeSource::Q, key.q());
    f(PrimeSource::Modulus, key.modulus());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(PrimeSource::Primes.table_name("bits", 0), "primes_bits.part_1.dat");
        assert_eq!(PrimeSource::Q.table_name("bytes", 2), "primes_bytes.q.part_3.dat");
        assert_eq!(PrimeSource::Modulus.table_name("bits", 1), "modulus_bits.part_2.dat");
    }

    #[test]
    fn test_parts() {
        let mut maps = PartMaps::default();
        for k in 0..300 {
            maps.get_mut(PrimeSource::P).insert(k, 1);
        }
        assert_eq!(maps.parts(PrimeSource::P, 128), 3);
        assert_eq!(maps.parts(PrimeSource::Q, 128), 0);
        assert_eq!(maps.part(PrimeSource::P, 2, 128).len(), 44);
    }
}
