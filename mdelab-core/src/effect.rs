//! Effect injection: statistic-aware perturbation of a drawn sample.
//!
//! "MDE" always means a percent change in the named statistic. Each
//! [`Statistic`] knows how to evaluate itself on a sample and how to perturb
//! a sample so that the statistic moves by exactly `mde_percent` percent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Perturbs a sample to simulate a relative effect of `mde_percent` percent.
/// Returns a new vector; the input is left untouched.
pub type EffectAdder = fn(&[f64], f64) -> Vec<f64>;

/// Statistics an experiment can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
}

/// Name → statistic lookup table.
const STATISTICS: &[(&str, Statistic)] = &[("mean", Statistic::Mean)];

impl Statistic {
    /// Every registered statistic.
    pub fn all() -> impl Iterator<Item = Statistic> {
        STATISTICS.iter().map(|&(_, s)| s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
        }
    }

    /// The perturbation that moves this statistic by a given percentage.
    pub fn effect_adder(&self) -> EffectAdder {
        match self {
            Statistic::Mean => add_relative_mean_effect,
        }
    }

    /// Evaluate the statistic on a sample. NaN for an empty sample.
    pub fn compute(&self, sample: &[f64]) -> f64 {
        match self {
            Statistic::Mean => {
                if sample.is_empty() {
                    f64::NAN
                } else {
                    sample.iter().sum::<f64>() / sample.len() as f64
                }
            }
        }
    }

    /// Value of the statistic after an effect of `mde_percent` percent.
    pub fn shifted(&self, value: f64, mde_percent: f64) -> f64 {
        value * (1.0 + mde_percent / 100.0)
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        STATISTICS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, s)| s)
            .ok_or_else(|| ConfigError::UnknownStatistic(name.to_string()))
    }
}

/// Look up the effect adder registered for a statistic name.
pub fn get_effect_adder(statistic_name: &str) -> Result<EffectAdder, ConfigError> {
    statistic_name.parse::<Statistic>().map(|s| s.effect_adder())
}

/// Uniform relative shift: multiplies every element by `1 + mde_percent / 100`.
///
/// Changes the mean by exactly `mde_percent` percent and keeps the relative
/// spread (coefficient of variation) of the sample.
fn add_relative_mean_effect(sample: &[f64], mde_percent: f64) -> Vec<f64> {
    let factor = 1.0 + mde_percent / 100.0;
    sample.iter().map(|&x| x * factor).collect()
}
