//! Order tests on the sequence of generated primes.
//!
//! Two classic nonparametric tests are run over three sequences: the
//! interleaved `p, q, p, q, ...` sequence, the p-only sequence and the
//! q-only sequence.
//!
//! - **Turning points**: a triple `(a, b, c)` is a turning point when `b`
//!   is a strict local extremum.
//! - **Positive differences**: a pair `(a, b)` counts when `a < b`.
//!
//! Counts are standardized with their asymptotic normal approximations.

use std::cmp::Ordering;

use num_bigint::BigUint;

use super::Stats;
use crate::key::KeyRecord;
use crate::output::ReportSink;

/// Returns true if `b` is a strict local extremum of `(a, b, c)`.
pub fn is_turning_point<T: Ord>(a: &T, b: &T, c: &T) -> bool {
    let ab = a.cmp(b);
    let bc = b.cmp(c);
    ab != Ordering::Equal && bc != Ordering::Equal && ab != bc
}

/// Standardized turning-point count `y` over `n` observations.
///
/// `None` when the variance term is not positive (n < 2).
pub fn turning_point_z(y: u64, n: u64) -> Option<f64> {
    let n = n as f64;
    let variance = (16.0 * n - 29.0) / 90.0;
    if variance <= 0.0 {
        return None;
    }
    Some((y as f64 - 2.0 * (n - 2.0) / 3.0) / variance.sqrt())
}

/// Standardized positive-difference count `y` over `n` observations.
///
/// `None` for an empty sequence.
pub fn positive_difference_z(y: u64, n: u64) -> Option<f64> {
    if n == 0 {
        return None;
    }
    let n = n as f64;
    Some((y as f64 - (n - 1.0) / 2.0) / ((n + 1.0) / 12.0).sqrt())
}

/// How many samples a window has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Nothing pushed yet.
    Empty,
    /// One value seen; no difference can be formed.
    OneSample,
    /// At least two values seen.
    Full,
}

/// Rolling window over the two most recent values of one sequence,
/// together with its test counters.
#[derive(Debug, Clone)]
pub struct SequenceWindow<T> {
    prev: Option<T>,
    prev_prev: Option<T>,
    observations: u64,
    turning_points: u64,
    positive_differences: u64,
}

impl<T> Default for SequenceWindow<T> {
    fn default() -> Self {
        Self {
            prev: None,
            prev_prev: None,
            observations: 0,
            turning_points: 0,
            positive_differences: 0,
        }
    }
}

impl<T: Ord + Clone> SequenceWindow<T> {
    /// Creates a window with no values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value and slides the window.
    pub fn push(&mut self, value: &T) {
        if let (Some(a), Some(b)) = (&self.prev_prev, &self.prev) {
            if is_turning_point(a, b, value) {
                self.turning_points += 1;
            }
        }
        if let Some(prev) = &self.prev {
            if prev < value {
                self.positive_differences += 1;
            }
        }
        self.prev_prev = self.prev.replace(value.clone());
        self.observations += 1;
    }

    /// Current window state.
    pub fn state(&self) -> WindowState {
        match (&self.prev_prev, &self.prev) {
            (Some(_), Some(_)) => WindowState::Full,
            (None, Some(_)) => WindowState::OneSample,
            _ => WindowState::Empty,
        }
    }

    /// Number of values pushed.
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Turning points seen so far.
    pub fn turning_points(&self) -> u64 {
        self.turning_points
    }

    /// Ascending consecutive pairs seen so far.
    pub fn positive_differences(&self) -> u64 {
        self.positive_differences
    }

    /// Counters and z-scores over `n` observations.
    fn statistic(&self, n: u64) -> SequenceStatistic {
        SequenceStatistic {
            turning_points: self.turning_points,
            turning_point_z: turning_point_z(self.turning_points, n),
            positive_differences: self.positive_differences,
            positive_difference_z: positive_difference_z(self.positive_differences, n),
        }
    }
}

/// Test counters of one sequence with their standardized values.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceStatistic {
    /// Number of turning points.
    pub turning_points: u64,
    /// z-score of the turning point count, if defined.
    pub turning_point_z: Option<f64>,
    /// Number of increases between neighbours.
    pub positive_differences: u64,
    /// z-score of the increase count, if defined.
    pub positive_difference_z: Option<f64>,
}

/// Result for the interleaved sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum CombinedStatistic {
    /// Every key has p < q, or every key has p > q; the interleaved
    /// sequence then carries no information.
    Ordered {
        /// Sum of the per-key order signs.
        order_sum: i64,
    },
    /// Primes are not consistently ordered.
    Unordered {
        /// Sum of the per-key order signs.
        order_sum: i64,
        /// Tests over the interleaved sequence.
        statistic: SequenceStatistic,
    },
}

/// Final randomness report.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomnessReport {
    /// Valid keys in the sequence.
    pub keys: u64,
    /// Tests over the p sequence.
    pub p: SequenceStatistic,
    /// Tests over the q sequence.
    pub q: SequenceStatistic,
    /// Tests over p and q interleaved.
    pub combined: CombinedStatistic,
}

fn fmt_z(z: Option<f64>) -> String {
    z.map_or_else(|| "undefined".to_owned(), |z| format!("{:.6}", z))
}

impl RandomnessReport {
    /// Human-readable report lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "There are {} and {} turning points in the prime sequence for p and q, standardized statistics is {} and {}",
                self.p.turning_points,
                self.q.turning_points,
                fmt_z(self.p.turning_point_z),
                fmt_z(self.q.turning_point_z),
            ),
            format!(
                "There are {} and {} positive differences in the prime sequence for p and q, standardized statistics is {} and {}",
                self.p.positive_differences,
                self.q.positive_differences,
                fmt_z(self.p.positive_difference_z),
                fmt_z(self.q.positive_difference_z),
            ),
        ];
        match &self.combined {
            CombinedStatistic::Ordered { .. } => {
                lines.push("Primes p and q are ordered, overall statistics not determined".into())
            }
            CombinedStatistic::Unordered { order_sum, statistic } => lines.push(format!(
                "Primes p and q are not ordered (sum of signums of differences is {}), there are overall {} turning points, standardized {}, and {} positive differences, standardized {}",
                order_sum,
                statistic.turning_points,
                fmt_z(statistic.turning_point_z),
                statistic.positive_differences,
                fmt_z(statistic.positive_difference_z),
            )),
        }
        lines
    }
}

/// Randomness analysis over the whole batch, independent of devices.
#[derive(Debug, Default)]
pub struct RandomnessStats {
    combined: SequenceWindow<BigUint>,
    p_only: SequenceWindow<BigUint>,
    q_only: SequenceWindow<BigUint>,
    keys: u64,
    order_sum: i64,
    finished: bool,
}

impl RandomnessStats {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys processed.
    pub fn keys(&self) -> u64 {
        self.keys
    }

    /// Sum over keys of +1 for p < q, -1 for p > q, 0 for p = q.
    pub fn order_sum(&self) -> i64 {
        self.order_sum
    }

    /// Returns true once the report has been printed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Builds the report from the current counters.
    pub fn report(&self) -> RandomnessReport {
        let ordered = self.order_sum.unsigned_abs() == self.keys;
        let combined = if ordered {
            CombinedStatistic::Ordered {
                order_sum: self.order_sum,
            }
        } else {
            CombinedStatistic::Unordered {
                order_sum: self.order_sum,
                statistic: self.combined.statistic(2 * self.keys),
            }
        };

        RandomnessReport {
            keys: self.keys,
            p: self.p_only.statistic(self.keys),
            q: self.q_only.statistic(self.keys),
            combined,
        }
    }
}

impl Stats for RandomnessStats {
    fn process(&mut self, key: &KeyRecord) {
        if self.finished {
            tracing::warn!("Randomness statistics already printed, key ignored");
            return;
        }

        self.combined.push(key.p());
        self.combined.push(key.q());
        self.p_only.push(key.p());
        self.q_only.push(key.q());

        self.order_sum += match key.p().cmp(key.q()) {
            Ordering::Less => 1,
            Ordering::Equal => 0,
            Ordering::Greater => -1,
        };
        self.keys += 1;
    }

    fn change_card(&mut self, _icsn: &str, _expected_keys: Option<u64>) {}

    fn print(&mut self, sink: &mut dyn ReportSink) {
        if self.finished {
            return;
        }
        self.finished = true;

        if self.keys == 0 {
            tracing::debug!("No keys for randomness statistics");
            return;
        }

        for line in self.report().lines() {
            tracing::info!("{}", line);
            sink.write_line(&line);
        }
    }
}
