//! Small prime table for trial division.

/// Ascending list of all primes strictly below a bound.
///
/// Built once with a Sieve of Eratosthenes and shared read-only
/// between analyzers (wrap it in an `Arc`).
#[derive(Debug, Clone)]
pub struct PrimeTable {
    bound: u32,
    primes: Vec<u32>,
}

impl PrimeTable {
    /// Sieves all primes below `bound`.
    pub fn new(bound: u32) -> Self {
        let size = bound as usize;
        let mut composite = vec![false; size];

        let mut i = 2usize;
        while i * i < size {
            if !composite[i] {
                for j in (i * i..size).step_by(i) {
                    composite[j] = true;
                }
            }
            i += 1;
        }

        let primes: Vec<u32> = (2..size)
            .filter(|&k| !composite[k])
            .map(|k| k as u32)
            .collect();

        tracing::debug!(bound, count = primes.len(), "Prime table sieved");

        Self { bound, primes }
    }

    /// Returns the exclusive upper bound of the table.
    #[inline]
    pub fn bound(&self) -> u32 {
        self.bound
    }

    /// Returns the primes in ascending order.
    #[inline]
    pub fn primes(&self) -> &[u32] {
        &self.primes
    }

    /// Returns the number of primes in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.primes.len()
    }

    /// Returns true if the table holds no primes (bound <= 2).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }
}
