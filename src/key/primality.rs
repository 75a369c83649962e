//! Probabilistic primality testing and modular arithmetic.
//!
//! Miller-Rabin witnesses are drawn from a ChaCha20 stream seeded with a
//! BLAKE3 digest of the candidate. The test is therefore deterministic for
//! a given input, which keeps repeated runs over the same corpus
//! bit-for-bit reproducible.

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use thiserror::Error;

/// Default number of Miller-Rabin rounds (error probability <= 4^-20).
pub const DEFAULT_PRIME_ROUNDS: u32 = 20;

/// Domain separator for witness seeding.
const WITNESS_DOMAIN: &[u8] = b"keycheck-miller-rabin-v1";

/// Trial divisors checked before Miller-Rabin.
const SMALL_PRIMES: &[u32] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Arithmetic errors on key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// No inverse exists because the operands share a factor.
    #[error("value is not invertible modulo {modulus}")]
    NoModularInverse {
        /// Modulus of the failed inversion.
        modulus: BigInt,
    },
}

/// Returns true if `n` is probably prime after `rounds` Miller-Rabin rounds.
pub fn is_probable_prime(n: &BigUint, rounds: u32) -> bool {
    if n < &BigUint::from(2u32) {
        return false;
    }
    for &p in SMALL_PRIMES {
        if *n == BigUint::from(p) {
            return true;
        }
        if (n % p).is_zero() {
            return false;
        }
    }

    let n_minus_1 = n - 1u32;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;

    let mut rng = witness_rng(n);
    let two = BigUint::from(2u32);

    'witness: for _ in 0..rounds.max(1) {
        let a = rng.gen_biguint_range(&two, &n_minus_1);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_1 {
            continue 'witness;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn witness_rng(n: &BigUint) -> ChaCha20Rng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(WITNESS_DOMAIN);
    hasher.update(&n.to_bytes_be());
    ChaCha20Rng::from_seed(*hasher.finalize().as_bytes())
}

/// Greatest common divisor, always non-negative.
pub fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    a.gcd(b)
}

/// Computes `a^-1 mod m`.
///
/// Fails if `m` is not positive or `gcd(a, m) != 1`.
pub fn mod_inverse(a: &BigInt, m: &BigInt) -> Result<BigUint, KeyError> {
    let no_inverse = || KeyError::NoModularInverse { modulus: m.clone() };
    if !m.is_positive() {
        return Err(no_inverse());
    }

    let (g, x) = extended_gcd(&a.mod_floor(m), m);
    if !g.is_one() {
        // gcd(0, 1) = 1 with x = 0, so m = 1 still yields the inverse 0
        return Err(no_inverse());
    }

    x.mod_floor(m).to_biguint().ok_or_else(no_inverse)
}

/// Returns `(gcd, x)` with `a*x + b*y = gcd` for some `y`.
fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let quotient = &old_r / &r;

        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    (old_r, old_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_small_values() {
        assert!(!is_probable_prime(&big(0), 20));
        assert!(!is_probable_prime(&big(1), 20));
        assert!(is_probable_prime(&big(2), 20));
        assert!(is_probable_prime(&big(61), 20));
        assert!(!is_probable_prime(&big(91), 20));
    }

    #[test]
    fn test_larger_primes_and_composites() {
        assert!(is_probable_prime(&big(1_000_000_007), 20));
        assert!(is_probable_prime(&big(2_147_483_647), 20));
        // Carmichael number
        assert!(!is_probable_prime(&big(561 * 1_000_003), 20));
        assert!(!is_probable_prime(&big(1_000_000_007 * 998_244_353), 20));
    }

    #[test]
    fn test_mersenne_127() {
        let m127 = (BigUint::one() << 127u32) - 1u32;
        assert!(is_probable_prime(&m127, 20));
        assert!(!is_probable_prime(&(&m127 + 2u32), 20));
    }

    #[test]
    fn test_deterministic() {
        let n = big(3_215_031_751); // strong pseudoprime to bases 2, 3, 5, 7
        let first = is_probable_prime(&n, 5);
        for _ in 0..10 {
            assert_eq!(is_probable_prime(&n, 5), first);
        }
    }

    #[test]
    fn test_mod_inverse() {
        let d = mod_inverse(&BigInt::from(17), &BigInt::from(3120)).unwrap();
        assert_eq!(d, big(2753));
    }

    #[test]
    fn test_mod_inverse_missing() {
        assert!(mod_inverse(&BigInt::from(6), &BigInt::from(3120)).is_err());
        assert!(mod_inverse(&BigInt::from(3), &BigInt::from(0)).is_err());
        assert!(mod_inverse(&BigInt::from(3), &BigInt::from(-7)).is_err());
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(&BigInt::from(17), &BigInt::from(3120)), BigInt::one());
        assert_eq!(gcd(&BigInt::from(12), &BigInt::from(-18)), BigInt::from(6));
    }
}
