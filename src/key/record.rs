//! Validated RSA key record.

use std::cell::OnceCell;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use super::primality::{gcd, is_probable_prime, mod_inverse, KeyError, DEFAULT_PRIME_ROUNDS};

/// A failed validity check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidityIssue {
    /// p failed the primality test.
    #[error("p {0} is not a prime")]
    PNotPrime(BigUint),
    /// q failed the primality test.
    #[error("q {0} is not a prime")]
    QNotPrime(BigUint),
    /// n differs from p * q.
    #[error("modulus {0} does not have factors p and q")]
    ModulusMismatch(BigUint),
    /// e shares a factor with phi(n).
    #[error("exponent {exponent} is not coprime to phi of {modulus}")]
    ExponentNotCoprime {
        /// Public exponent of the key.
        exponent: BigUint,
        /// Modulus of the key.
        modulus: BigUint,
    },
}

/// Cached outcome of the validity checks.
#[derive(Debug, Clone, Default)]
pub struct Validity {
    issues: Vec<ValidityIssue>,
}

impl Validity {
    /// Returns true if every check passed.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns every failed check, in evaluation order.
    #[inline]
    pub fn issues(&self) -> &[ValidityIssue] {
        &self.issues
    }
}

/// One RSA key: public exponent, modulus, both primes and an optional
/// generation time in milliseconds.
///
/// Fields cannot change after construction. Validity and the private
/// exponent are evaluated on first access and cached, so every analyzer
/// observes the same answer.
#[derive(Clone)]
pub struct KeyRecord {
    exponent: BigUint,
    modulus: BigUint,
    p: BigUint,
    q: BigUint,
    time: Option<i64>,
    prime_rounds: u32,
    validity: OnceCell<Validity>,
    private_exponent: OnceCell<Result<BigUint, KeyError>>,
}

impl KeyRecord {
    /// Creates a key record from its components.
    pub fn new(exponent: BigUint, modulus: BigUint, p: BigUint, q: BigUint) -> Self {
        Self {
            exponent,
            modulus,
            p,
            q,
            time: None,
            prime_rounds: DEFAULT_PRIME_ROUNDS,
            validity: OnceCell::new(),
            private_exponent: OnceCell::new(),
        }
    }

    /// Sets the generation time in milliseconds.
    pub fn with_time(mut self, time_ms: i64) -> Self {
        self.time = Some(time_ms);
        self
    }

    /// Sets the number of Miller-Rabin rounds used by validation.
    pub fn with_prime_rounds(mut self, rounds: u32) -> Self {
        self.prime_rounds = rounds.max(1);
        self
    }

    /// Public exponent e.
    #[inline]
    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// Modulus n.
    #[inline]
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// First prime.
    #[inline]
    pub fn p(&self) -> &BigUint {
        &self.p
    }

    /// Second prime.
    #[inline]
    pub fn q(&self) -> &BigUint {
        &self.q
    }

    /// Generation time in milliseconds, if the source recorded one.
    #[inline]
    pub fn time(&self) -> Option<i64> {
        self.time
    }

    /// Returns true if p and q are probable primes, p*q = n and
    /// gcd(e, phi(n)) = 1.
    pub fn is_valid(&self) -> bool {
        self.validity().is_valid()
    }

    /// Returns the cached validity, evaluating all checks on first call.
    pub fn validity(&self) -> &Validity {
        self.validity.get_or_init(|| self.check_validity())
    }

    /// Convenience accessor for the failed checks.
    pub fn issues(&self) -> &[ValidityIssue] {
        self.validity().issues()
    }

    fn check_validity(&self) -> Validity {
        let mut issues = Vec::new();

        if !is_probable_prime(&self.p, self.prime_rounds) {
            issues.push(ValidityIssue::PNotPrime(self.p.clone()));
        }
        if !is_probable_prime(&self.q, self.prime_rounds) {
            issues.push(ValidityIssue::QNotPrime(self.q.clone()));
        }
        if &self.p * &self.q != self.modulus {
            issues.push(ValidityIssue::ModulusMismatch(self.modulus.clone()));
        }
        if !gcd(&self.phi(), &BigInt::from(self.exponent.clone())).is_one() {
            issues.push(ValidityIssue::ExponentNotCoprime {
                exponent: self.exponent.clone(),
                modulus: self.modulus.clone(),
            });
        }

        for issue in &issues {
            tracing::debug!(%issue, "Key failed validation");
        }

        Validity { issues }
    }

    /// phi(n) computed as n - p - q + 1; negative for inconsistent keys.
    fn phi(&self) -> BigInt {
        BigInt::from(self.modulus.clone()) - BigInt::from(self.p.clone())
            - BigInt::from(self.q.clone())
            + 1
    }

    /// Returns |p - q|.
    pub fn prime_difference(&self) -> BigUint {
        if self.p >= self.q {
            &self.p - &self.q
        } else {
            &self.q - &self.p
        }
    }

    /// Returns e^-1 mod phi(n).
    ///
    /// Zero when either prime is zero; an error when e is not invertible.
    pub fn private_exponent(&self) -> Result<&BigUint, KeyError> {
        self.private_exponent
            .get_or_init(|| {
                if self.p.is_zero() || self.q.is_zero() {
                    return Ok(BigUint::zero());
                }
                mod_inverse(&BigInt::from(self.exponent.clone()), &self.phi())
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Formats the key as one line of the flat CSV format:
    /// `number;N;e;P;Q;D;time` with hexadecimal numbers.
    pub fn to_csv_line(&self, key_number: u64) -> Result<String, KeyError> {
        let private_exponent = self.private_exponent()?;
        Ok(format!(
            "{};{:X};{:x};{:X};{:X};{:X};{}",
            key_number,
            self.modulus,
            self.exponent,
            self.p,
            self.q,
            private_exponent,
            self.time.unwrap_or(0)
        ))
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("exponent", &self.exponent)
            .field("modulus_bits", &self.modulus.bits())
            .field("p_bits", &self.p.bits())
            .field("q_bits", &self.q.bits())
            .field("time", &self.time)
            .finish()
    }
}
