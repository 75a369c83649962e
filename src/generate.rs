//! Synthetic key corpus generation.
//!
//! Produces a reference batch of RSA keys from a well-seeded CSPRNG in
//! the flat CSV format, so the analyses can be compared against keys
//! with no device-specific bias.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use thiserror::Error;

use crate::key::{is_probable_prime, KeyError, KeyRecord, DEFAULT_PRIME_ROUNDS};
use crate::progress::Progress;

/// Public exponent of generated keys.
pub const GENERATED_EXPONENT: u32 = 65_537;

/// Keys generated when no count is given.
pub const DEFAULT_KEY_COUNT: u64 = 50_000;

/// Supported modulus lengths.
pub const SUPPORTED_KEY_BITS: [u64; 2] = [512, 1024];

/// Errors that can occur while generating keys.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Only 512 and 1024 bit keys are generated.
    #[error("unsupported key length {0} (use 512 or 1024)")]
    UnsupportedKeyBits(u64),
    /// The output file could not be written.
    #[error("cannot write {}: {source}", path.display())]
    Io {
        /// Output file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A generated key could not be serialized.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Default output file name for keys of `key_bits` bits.
pub fn output_file_name(key_bits: u64) -> String {
    format!("keycheck.{}b.csv", key_bits)
}

/// Draws RSA keys with primes of half the modulus length.
pub struct KeyGenerator<R> {
    rng: R,
    prime_bits: u64,
    rounds: u32,
    exponent: BigUint,
}

impl KeyGenerator<ChaCha20Rng> {
    /// Creates a generator backed by ChaCha20 seeded from the OS.
    pub fn from_os_entropy(key_bits: u64) -> Result<Self, GenerateError> {
        let mut seed = [0u8; 32];
        rand_core::OsRng.fill_bytes(&mut seed);
        Self::new(ChaCha20Rng::from_seed(seed), key_bits)
    }
}

impl<R: Rng> KeyGenerator<R> {
    /// Creates a generator for `key_bits`-bit moduli drawing from `rng`.
    pub fn new(rng: R, key_bits: u64) -> Result<Self, GenerateError> {
        if !SUPPORTED_KEY_BITS.contains(&key_bits) {
            return Err(GenerateError::UnsupportedKeyBits(key_bits));
        }
        Ok(Self {
            rng,
            prime_bits: key_bits / 2,
            rounds: DEFAULT_PRIME_ROUNDS,
            exponent: BigUint::from(GENERATED_EXPONENT),
        })
    }

    /// Draws a probable prime with exactly `prime_bits` bits.
    pub fn prime(&mut self) -> BigUint {
        loop {
            let mut candidate = self.rng.gen_biguint(self.prime_bits);
            candidate.set_bit(self.prime_bits - 1, true);
            candidate.set_bit(0, true);
            if is_probable_prime(&candidate, self.rounds) {
                return candidate;
            }
        }
    }

    /// Draws a key whose phi(n) is coprime to the exponent.
    ///
    /// The generation time covers every redraw.
    pub fn key(&mut self) -> KeyRecord {
        let start = Instant::now();
        loop {
            let p = self.prime();
            let q = self.prime();
            if p == q {
                continue;
            }
            let phi = (&p - 1u32) * (&q - 1u32);
            if !phi.gcd(&self.exponent).is_one() {
                tracing::debug!("Exponent not coprime to phi, redrawing");
                continue;
            }
            let modulus = &p * &q;
            return KeyRecord::new(self.exponent.clone(), modulus, p, q)
                .with_time(start.elapsed().as_millis() as i64);
        }
    }
}

/// Writes `count` keys from `generator` to `path`.
///
/// Returns the number of keys written, which is smaller than `count`
/// only when `interrupt` is raised.
pub fn generate<R: Rng>(
    generator: &mut KeyGenerator<R>,
    count: u64,
    path: &Path,
    progress: &mut Progress,
    interrupt: &AtomicBool,
) -> Result<u64, GenerateError> {
    let io = |source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io)?);

    tracing::info!(count, prime_bits = generator.prime_bits, path = %path.display(), "Generating keys");
    progress.start_file(path, count);

    let mut written = 0;
    while written < count {
        if interrupt.load(Ordering::SeqCst) {
            tracing::warn!(written, "Interrupted, stopping generation");
            break;
        }
        let key = generator.key();
        written += 1;
        writeln!(writer, "{}", key.to_csv_line(written)?).map_err(io)?;
        progress.key_done();
    }

    writer.flush().map_err(io)?;
    progress.finish_file();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CsvSource, RecordSource};
    use crate::stats::StatsContainer;

    fn generator() -> KeyGenerator<ChaCha20Rng> {
        KeyGenerator::new(ChaCha20Rng::seed_from_u64(7), 512).unwrap()
    }

    #[test]
    fn test_unsupported_length() {
        assert!(matches!(
            KeyGenerator::new(ChaCha20Rng::seed_from_u64(0), 768),
            Err(GenerateError::UnsupportedKeyBits(768))
        ));
        assert_eq!(output_file_name(1024), "keycheck.1024b.csv");
    }

    #[test]
    fn test_generated_keys_are_valid() {
        let mut generator = generator();
        for _ in 0..2 {
            let key = generator.key();
            assert!(key.is_valid());
            assert_eq!(key.p().bits(), 256);
            assert_eq!(key.q().bits(), 256);
            assert_eq!(key.exponent(), &BigUint::from(GENERATED_EXPONENT));
            assert!(key.time().is_some());
        }
    }

    #[test]
    fn test_generated_file_loads_back() {
        let path = std::env::temp_dir().join(format!("keycheck-gen-{}.csv", std::process::id()));
        let written = generate(
            &mut generator(),
            3,
            &path,
            &mut Progress::hidden(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(written, 3);

        let summary = CsvSource::new(crate::source::SourceOptions::default())
            .load(&path, &mut StatsContainer::new(), &mut Progress::hidden())
            .unwrap();
        assert_eq!(summary.keys, 3);
        assert_eq!(summary.invalid, 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_interrupt_stops_generation() {
        let path = std::env::temp_dir().join(format!("keycheck-gen-int-{}.csv", std::process::id()));
        let written = generate(
            &mut generator(),
            10,
            &path,
            &mut Progress::hidden(),
            &AtomicBool::new(true),
        )
        .unwrap();
        assert_eq!(written, 0);
        let _ = std::fs::remove_file(&path);
    }
}
