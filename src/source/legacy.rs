//! Colon-delimited format with TLV-encoded keys.
//!
//! ```text
//! CPLC.ICSerialNumber;0123456789
//! PUBL:82 0003 010001 82 0040 C3...
//! PRIV:82 0020 F1... 82 0020 D7...
//! #0:0.125
//! ```
//!
//! A record is complete at the `#...:<seconds>` line carrying its
//! generation time.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use num_bigint::BigUint;

use super::{LoadSummary, RecordSource, SourceError, SourceOptions};
use crate::key::KeyRecord;
use crate::progress::Progress;
use crate::stats::Stats;

const CARD_TAG: &str = "CPLC.ICSerialNumber";
const TLV_TYPE: &str = "82";

/// Decodes a sequence of `82 LLLL <2*L hex digits>` fields.
///
/// Whitespace must already be removed.
pub fn parse_tlv(value: &str) -> Result<Vec<BigUint>, String> {
    if !value.is_ascii() {
        return Err(format!("non-ASCII TLV in {}", value));
    }
    if value.len() % 2 == 1 {
        return Err(format!("odd string length of {}", value));
    }

    let mut values = Vec::new();
    let mut offset = 0;
    while offset < value.len() {
        let header_end = offset + 6;
        if header_end > value.len() {
            return Err(format!("invalid TLV length in {}", value));
        }
        if &value[offset..offset + 2] != TLV_TYPE {
            return Err(format!("invalid TLV type in {}", value));
        }
        let length = usize::from_str_radix(&value[offset + 2..header_end], 16)
            .map_err(|_| format!("invalid TLV length in {}", value))?;
        let end = header_end + 2 * length;
        if end > value.len() {
            return Err(format!("invalid TLV length in {}", value));
        }
        let number = BigUint::parse_bytes(value[header_end..end].as_bytes(), 16)
            .ok_or_else(|| format!("invalid TLV value in {}", value))?;
        values.push(number);
        offset = end;
    }
    Ok(values)
}

fn parse_pair(value: &str, what: &str) -> Result<(BigUint, BigUint), String> {
    let values = parse_tlv(value)?;
    match <[BigUint; 2]>::try_from(values) {
        Ok([first, second]) => Ok((first, second)),
        Err(values) => Err(format!(
            "{} {} not composed from 2 values (found {})",
            what,
            value,
            values.len()
        )),
    }
}

/// Key being assembled from consecutive lines.
struct Pending {
    exponent: BigUint,
    modulus: BigUint,
    primes: Option<(BigUint, BigUint)>,
}

/// Reader for the legacy format.
#[derive(Debug, Clone, Default)]
pub struct LegacySource {
    options: SourceOptions,
}

impl LegacySource {
    /// Creates a legacy format reader.
    pub fn new(options: SourceOptions) -> Self {
        Self { options }
    }

    fn count_keys(&self, path: &Path) -> Result<u64, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::io(path, e))?;
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| SourceError::io(path, e))?;
            if matches!(line.split_once(':'), Some(("PRIV", _))) {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl RecordSource for LegacySource {
    fn load(
        &self,
        path: &Path,
        stats: &mut dyn Stats,
        progress: &mut Progress,
    ) -> Result<LoadSummary, SourceError> {
        let expected = self.count_keys(path)?;
        progress.start_file(path, expected);

        let file = File::open(path).map_err(|e| SourceError::io(path, e))?;
        let mut summary = LoadSummary::default();
        let mut pending: Option<Pending> = None;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            if self.options.interrupted() {
                tracing::warn!(path = %path.display(), "Interrupted, stopping input");
                break;
            }
            let line_number = index as u64 + 1;
            let line = line.map_err(|e| SourceError::io(path, e))?;
            let malformed = |message: String| SourceError::malformed(path, line_number, message);

            if let Some((CARD_TAG, icsn)) = line.split_once(';') {
                stats.change_card(icsn.trim(), None);
            }

            let Some((tag, value)) = line.split_once(':') else {
                continue;
            };
            let value: String = value.chars().filter(|c| !c.is_whitespace()).collect();

            match tag {
                "PUBL" => {
                    if pending.is_some() {
                        return Err(malformed(
                            "loading public key while another public key is loaded".into(),
                        ));
                    }
                    let (exponent, modulus) = parse_pair(&value, "public key").map_err(malformed)?;
                    pending = Some(Pending {
                        exponent,
                        modulus,
                        primes: None,
                    });
                }
                "PRIV" => {
                    let Some(key) = pending.as_mut() else {
                        return Err(malformed(
                            "loading private key while public key not loaded".into(),
                        ));
                    };
                    key.primes = Some(parse_pair(&value, "private key").map_err(malformed)?);
                }
                _ if tag.starts_with('#') => {
                    let Some(Pending {
                        exponent,
                        modulus,
                        primes: Some((p, q)),
                    }) = pending.take()
                    else {
                        return Err(malformed(
                            "loading time while public or private key not loaded".into(),
                        ));
                    };
                    let seconds: f64 = value
                        .parse()
                        .map_err(|_| malformed(format!("invalid time {}", value)))?;

                    let key = KeyRecord::new(exponent, modulus, p, q)
                        .with_time((seconds * 1000.0) as i64)
                        .with_prime_rounds(self.options.prime_rounds);
                    stats.process(&key);
                    summary.record(&key);
                    progress.key_done();
                }
                _ => {}
            }
        }

        progress.finish_file();
        Ok(summary)
    }
}
