//! Frequency of set bits at every position of p, q and n.

use std::borrow::Cow;

use num_bigint::BigUint;

use super::{for_each_source, PartMaps, PrimeSource};
use crate::key::KeyRecord;
use crate::stats::{CardInfo, CardStats, Frequency};

/// Bit positions per output table.
pub const BITS_IN_PART: i64 = 128;

/// Counts, for each bit position (0 = most significant), how many keys
/// have that bit set.
#[derive(Debug)]
pub struct AllBitsStats {
    info: CardInfo,
    maps: PartMaps,
}

impl AllBitsStats {
    /// Creates the statistics of device `icsn`.
    pub fn new(icsn: &str, expected_keys: Option<u64>) -> Self {
        Self {
            info: CardInfo::new(icsn, expected_keys),
            maps: PartMaps::default(),
        }
    }

    /// Distributions in output order as (source, part).
    fn layout(&self) -> impl Iterator<Item = (PrimeSource, usize)> + '_ {
        PrimeSource::ALL
            .into_iter()
            .flat_map(move |source| (0..self.maps.parts(source, BITS_IN_PART)).map(move |part| (source, part)))
    }
}

fn record_bits(freq: &mut Frequency, n: &BigUint) {
    let len = n.bits();
    for position in 0..len {
        let count = freq.entry(position as i64).or_insert(0);
        if n.bit(len - 1 - position) {
            *count += 1;
        }
    }
}

impl CardStats for AllBitsStats {
    fn info(&self) -> &CardInfo {
        &self.info
    }

    fn data_names(&self) -> Vec<String> {
        self.layout()
            .map(|(source, part)| source.table_name("bits", part))
            .collect()
    }

    fn data(&self, index: usize) -> Cow<'_, Frequency> {
        match self.layout().nth(index) {
            Some((source, part)) => self.maps.part(source, part, BITS_IN_PART),
            None => Cow::Owned(Frequency::new()),
        }
    }

    /// Every prime contributes to the pooled tables, so they count twice
    /// per key.
    fn total_for(&self, index: usize) -> u64 {
        let keys = self.info.processed_keys();
        match self.layout().nth(index) {
            Some((PrimeSource::Primes, _)) => 2 * keys,
            _ => keys,
        }
    }

    fn process(&mut self, key: &KeyRecord) {
        if !key.is_valid() {
            return;
        }
        self.info.record_key();

        let maps = &mut self.maps;
        for_each_source(key, |source, n| record_bits(maps.get_mut(source), n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::BinningPolicy;

    fn key(p: u64, q: u64) -> KeyRecord {
        KeyRecord::new(
            BigUint::from(17u32),
            BigUint::from(p * q),
            BigUint::from(p),
            BigUint::from(q),
        )
    }

    #[test]
    fn test_bit_positions() {
        let mut stats = AllBitsStats::new("A", None);
        // 61 = 111101, 53 = 110101, 3233 = 110010100001
        stats.process(&key(61, 53));

        assert_eq!(
            stats.data_names(),
            vec![
                "primes_bits.part_1.dat",
                "primes_bits.p.part_1.dat",
                "primes_bits.q.part_1.dat",
                "modulus_bits.part_1.dat",
            ]
        );

        let pooled = stats.data(0);
        assert_eq!(pooled.values().copied().collect::<Vec<_>>(), vec![2, 2, 1, 2, 0, 2]);
        let p = stats.data(1);
        assert_eq!(p.values().copied().collect::<Vec<_>>(), vec![1, 1, 1, 1, 0, 1]);
        assert_eq!(stats.data(3).len(), 12);

        assert_eq!(stats.total_for(0), 2);
        assert_eq!(stats.total_for(1), 1);
    }

    #[test]
    fn test_percentages_of_ones() {
        let mut stats = AllBitsStats::new("A", None);
        stats.process(&key(61, 53));
        stats.process(&key(47, 73));

        let table = stats.percentage_data(1, &BinningPolicy::default(), 0, 6);
        // 61 = 111101, 47 = 101111
        assert_eq!(table[&0], 100.0);
        assert_eq!(table[&1], 50.0);
        assert_eq!(table[&5], 100.0);
    }

    #[test]
    fn test_long_numbers_split_into_parts() {
        let mut stats = AllBitsStats::new("A", None);
        let p = (BigUint::from(1u32) << 199u32) + 1u32;
        let q = (BigUint::from(1u32) << 199u32) + 3u32;
        let n = &p * &q;
        // positions are recorded regardless of validity
        let record = KeyRecord::new(BigUint::from(3u32), n, p, q);
        let mut maps = PartMaps::default();
        for_each_source(&record, |source, n| record_bits(maps.get_mut(source), n));

        assert_eq!(maps.parts(PrimeSource::P, BITS_IN_PART), 2);
        assert_eq!(maps.parts(PrimeSource::Modulus, BITS_IN_PART), 4);
        assert_eq!(maps.part(PrimeSource::P, 1, BITS_IN_PART).len(), 72);

        stats.maps = maps;
        assert_eq!(stats.data_names().len(), 2 + 2 + 2 + 4);
        assert_eq!(stats.data_names()[9], "modulus_bits.part_4.dat");
    }
}
