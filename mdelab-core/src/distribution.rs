//! Discrete empirical distribution built from a raw metric sample.
//!
//! Values are rounded to a fixed number of decimal digits and counted, giving
//! a finite value → probability mass function that keeps the shape of the real
//! data. The rounding rule is either explicit, a fixed default, or adaptive
//! (chosen from the spread of the data).
//!
//! Draws go through `rand_distr`'s `WeightedAliasIndex`: O(k) to build for k
//! distinct values, O(1) per draw afterwards.

use rand::distributions::WeightedError;
use rand::Rng;
use rand_distr::{Distribution, WeightedAliasIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digits used when no rounding is requested and adaptive rounding is off,
/// or when the data has zero spread.
pub const DEFAULT_ROUND_DIGITS: u32 = 2;

/// Upper bound for adaptively chosen digits.
pub const MAX_ADAPTIVE_DIGITS: u32 = 6;

/// Upper bound for explicitly requested digits (f64 carries ~15-17 significant digits).
pub const MAX_ROUND_DIGITS: u32 = 15;

/// Errors from building a distribution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("sample has no usable values after dropping missing entries")]
    EmptyInput,
    #[error("round_digits {0} exceeds the maximum of 15")]
    InvalidRounding(u32),
    #[error("cannot build alias table: {0}")]
    Weights(#[from] WeightedError),
}

/// A source the power search can draw samples from.
///
/// Implemented by [`EmpiricalDistribution`]. The engine only needs the support
/// (to check the configured test can be applied) and single draws.
pub trait Resample: Sync {
    /// Distinct values that can be drawn, ascending.
    fn support(&self) -> &[f64];

    /// Draw one value.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64;

    /// Draw `n` independent values into a new vector.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.draw(rng)).collect()
    }
}

/// One row of the distribution table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionRow {
    pub value: f64,
    pub probability: f64,
    pub cumulative_probability: f64,
}

/// Discrete value → probability distribution.
///
/// Invariants (established by [`EmpiricalDistribution::build`]):
/// - `values` strictly increasing, non-empty
/// - `probabilities` non-negative, summing to 1 within floating tolerance
/// - `cumulative[i]` is the running sum of `probabilities[..=i]`
#[derive(Debug, Clone)]
pub struct EmpiricalDistribution {
    values: Vec<f64>,
    probabilities: Vec<f64>,
    cumulative: Vec<f64>,
    round_digits: u32,
    observations: usize,
    alias: WeightedAliasIndex<f64>,
}

impl EmpiricalDistribution {
    /// Build a distribution from a raw sample.
    ///
    /// NaN and infinite entries are treated as missing and dropped. When
    /// `round_digits` is `None`, `adaptive` picks the digits from the sample's
    /// standard deviation; otherwise [`DEFAULT_ROUND_DIGITS`] is used.
    pub fn build(
        sample: &[f64],
        round_digits: Option<u32>,
        adaptive: bool,
    ) -> Result<Self, DistributionError> {
        let data: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
        if data.is_empty() {
            return Err(DistributionError::EmptyInput);
        }

        let digits = match round_digits {
            Some(d) if d > MAX_ROUND_DIGITS => return Err(DistributionError::InvalidRounding(d)),
            Some(d) => d,
            None if adaptive => adaptive_round_digits(&data),
            None => DEFAULT_ROUND_DIGITS,
        };

        let mut rounded: Vec<f64> = data.iter().map(|&v| round_to(v, digits)).collect();
        rounded.sort_by(f64::total_cmp);

        let mut values: Vec<f64> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        for v in rounded {
            if values.last() == Some(&v) {
                if let Some(count) = counts.last_mut() {
                    *count += 1;
                }
            } else {
                values.push(v);
                counts.push(1);
            }
        }

        let n = data.len() as f64;
        let probabilities: Vec<f64> = counts.iter().map(|&c| c as f64 / n).collect();
        let cumulative: Vec<f64> = probabilities
            .iter()
            .scan(0.0, |acc, &p| {
                *acc += p;
                Some(*acc)
            })
            .collect();
        let alias = WeightedAliasIndex::new(probabilities.clone())?;

        Ok(Self {
            values,
            probabilities,
            cumulative,
            round_digits: digits,
            observations: data.len(),
            alias,
        })
    }

    /// Distinct rounded values, ascending.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn cumulative_probabilities(&self) -> &[f64] {
        &self.cumulative
    }

    /// Rounding actually used (explicit, default, or adaptive outcome).
    pub fn round_digits(&self) -> u32 {
        self.round_digits
    }

    /// Number of non-missing observations the distribution was built from.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a built distribution; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean of the discrete distribution.
    pub fn mean(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.probabilities)
            .map(|(v, p)| v * p)
            .sum()
    }

    /// Population standard deviation of the discrete distribution.
    pub fn std_dev(&self) -> f64 {
        let mean = self.mean();
        let variance: f64 = self
            .values
            .iter()
            .zip(&self.probabilities)
            .map(|(v, p)| p * (v - mean).powi(2))
            .sum();
        variance.max(0.0).sqrt()
    }

    /// Value / probability / cumulative probability rows, ascending by value.
    pub fn table(&self) -> Vec<DistributionRow> {
        self.values
            .iter()
            .zip(&self.probabilities)
            .zip(&self.cumulative)
            .map(|((&value, &probability), &cumulative_probability)| DistributionRow {
                value,
                probability,
                cumulative_probability,
            })
            .collect()
    }

    /// Lazy sequence of `n` independent draws.
    pub fn draws<'a, R: Rng + ?Sized>(
        &'a self,
        rng: &'a mut R,
        n: usize,
    ) -> impl Iterator<Item = f64> + 'a {
        (0..n).map(move |_| Resample::draw(self, rng))
    }
}

impl Resample for EmpiricalDistribution {
    fn support(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.values[self.alias.sample(rng)]
    }
}

/// Choose rounding digits from the spread of the data.
///
/// `clamp(floor(-log10(σ)) + 2, 0, 6)` with σ the population standard
/// deviation; σ == 0 falls back to [`DEFAULT_ROUND_DIGITS`].
pub fn adaptive_round_digits(data: &[f64]) -> u32 {
    let n = data.len();
    if n == 0 {
        return DEFAULT_ROUND_DIGITS;
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    let variance = data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return DEFAULT_ROUND_DIGITS;
    }

    let digits = (-std_dev.log10()).floor() + 2.0;
    digits.clamp(0.0, MAX_ADAPTIVE_DIGITS as f64) as u32
}

/// Round half away from zero to `digits` decimals; `-0.0` becomes `0.0`.
/// Ties go away from zero, where numpy's `round` would pick the even neighbour.
fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    let rounded = scaled.round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
