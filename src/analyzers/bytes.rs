//! Distribution of byte values at every byte position of p, q and n.

use std::borrow::Cow;

use num_bigint::BigUint;

use super::{for_each_source, PartMaps, PrimeSource};
use crate::key::KeyRecord;
use crate::stats::frequency::{increment, insert_if_absent};
use crate::stats::{CardInfo, CardStats, Frequency};

/// Distinct byte values, and keys per byte position.
pub const VALUES_IN_PART: i64 = 256;

/// Byte positions to analyse, counted from the most significant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteSelection {
    /// Every byte position.
    All,
    /// Only the first `from_start` and last `from_end` positions.
    Ends {
        /// Positions taken from the most significant end.
        from_start: usize,
        /// Positions taken from the least significant end.
        from_end: usize,
    },
}

impl Default for ByteSelection {
    fn default() -> Self {
        Self::Ends {
            from_start: 1,
            from_end: 1,
        }
    }
}

impl ByteSelection {
    /// Returns true if position `index` of a `len`-byte number is analysed.
    pub fn includes(&self, index: usize, len: usize) -> bool {
        match *self {
            Self::All => true,
            Self::Ends { from_start, from_end } => index < from_start || index + from_end >= len,
        }
    }
}

/// Counts byte values per position. The key of value `v` at byte
/// position `b` is `b * 256 + v`.
#[derive(Debug)]
pub struct AllBytesStats {
    info: CardInfo,
    selection: ByteSelection,
    maps: PartMaps,
}

impl AllBytesStats {
    /// Creates the statistics of device `icsn` over the positions in `selection`.
    pub fn new(icsn: &str, expected_keys: Option<u64>, selection: ByteSelection) -> Self {
        Self {
            info: CardInfo::new(icsn, expected_keys),
            selection,
            maps: PartMaps::default(),
        }
    }

    /// Selected distributions in output order as (source, byte position).
    ///
    /// Positions are selected against the longest number seen, so the
    /// trailing bytes of shorter numbers fall into unselected middle parts.
    fn layout(&self) -> impl Iterator<Item = (PrimeSource, usize)> + '_ {
        PrimeSource::ALL.into_iter().flat_map(move |source| {
            let parts = self.maps.parts(source, VALUES_IN_PART);
            (0..parts)
                .filter(move |&part| self.selection.includes(part, parts))
                .map(move |part| (source, part))
        })
    }
}

fn record_bytes(freq: &mut Frequency, n: &BigUint) {
    let bytes = n.to_bytes_be();
    let positions = bytes.len() as i64 * VALUES_IN_PART;
    if (freq.len() as i64) < positions {
        for key in 0..positions {
            insert_if_absent(freq, key, 0);
        }
    }

    for (index, &value) in bytes.iter().enumerate() {
        increment(freq, index as i64 * VALUES_IN_PART + i64::from(value));
    }
}

impl CardStats for AllBytesStats {
    fn info(&self) -> &CardInfo {
        &self.info
    }

    fn data_names(&self) -> Vec<String> {
        self.layout()
            .map(|(source, part)| source.table_name("bytes", part))
            .collect()
    }

    fn data(&self, index: usize) -> Cow<'_, Frequency> {
        match self.layout().nth(index) {
            Some((source, part)) => self.maps.part(source, part, VALUES_IN_PART),
            None => Cow::Owned(Frequency::new()),
        }
    }

    fn label_for_key(&self, _index: usize, key: i64) -> String {
        format!("{:08b}", key.rem_euclid(VALUES_IN_PART))
    }

    fn process(&mut self, key: &KeyRecord) {
        if !key.is_valid() {
            return;
        }
        self.info.record_key();

        let maps = &mut self.maps;
        for_each_source(key, |source, n| record_bytes(maps.get_mut(source), n));
    }
}
