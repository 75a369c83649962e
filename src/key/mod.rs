//! RSA key material and the arithmetic needed to check it.
//!
//! A [`KeyRecord`] is immutable once built. Everything the analyzers
//! derive from it (validity, prime difference, private exponent) is
//! computed lazily and cached on the record.

mod primality;
mod record;
mod sieve;

pub use primality::{
    gcd, is_probable_prime, mod_inverse, KeyError, DEFAULT_PRIME_ROUNDS,
};
pub use record::{KeyRecord, Validity, ValidityIssue};
pub use sieve::PrimeTable;
