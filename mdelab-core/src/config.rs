//! Experiment configuration.
//!
//! [`ExperimentParams`] is the flat keyed form: string names, loadable from
//! TOML or filled in by a caller. [`ExperimentParams::validate`] checks it once
//! and produces an immutable [`ExperimentConfig`] with names resolved to
//! enums. The engine trusts an `ExperimentConfig` and never re-validates.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::effect::{EffectAdder, Statistic};
use crate::stat_tests::{TestFn, TestMethod};

/// Significance levels an experiment may use.
pub const ALLOWED_ALPHAS: [f64; 3] = [0.01, 0.05, 0.1];

/// Largest sample size the search tests when the config does not set one.
pub const DEFAULT_MAX_SAMPLE_SIZE: usize = 50_000;

/// Hard upper bound for `max_sample_size`.
pub const SAMPLE_SIZE_HARD_CEILING: usize = 500_000;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown statistic '{0}' (known: mean)")]
    UnknownStatistic(String),
    #[error("unknown test method '{0}' (known: t_test, z_proportion_test)")]
    UnknownTestMethod(String),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Flat, serializable experiment parameters.
///
/// Field names match the keys of the TOML config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentParams {
    /// Significance level, one of [`ALLOWED_ALPHAS`].
    pub alpha: f64,
    /// Power the search stops at, in (0, 1).
    pub target_power: f64,
    /// Signed relative effect in percent (5.0 = +5%).
    pub mde_percent: f64,
    /// Statistic name, e.g. "mean".
    pub statistic: String,
    /// Test name, e.g. "t_test".
    pub test_method: String,
    /// Simulations per sample size.
    pub num_emulations: usize,
    /// First sample size tested (per group).
    pub sample_size: usize,
    /// Increment between tested sample sizes.
    pub sample_step: usize,
    /// Master seed. `None` draws one from the thread RNG; the one used is
    /// reported on the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Sample-size ceiling. Defaults to [`DEFAULT_MAX_SAMPLE_SIZE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sample_size: Option<usize>,
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            target_power: 0.8,
            mde_percent: 1.0,
            statistic: "mean".into(),
            test_method: "t_test".into(),
            num_emulations: 1000,
            sample_size: 1000,
            sample_step: 500,
            seed: None,
            max_sample_size: None,
        }
    }
}

impl ExperimentParams {
    /// Load parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse parameters from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check every field and resolve names. Unknown names fail first.
    pub fn validate(&self) -> Result<ExperimentConfig, ConfigError> {
        let statistic: Statistic = self.statistic.parse()?;
        let test_method: TestMethod = self.test_method.parse()?;

        if !ALLOWED_ALPHAS.iter().any(|a| (a - self.alpha).abs() < 1e-12) {
            return Err(invalid(
                "alpha",
                format!("{} is not one of {:?}", self.alpha, ALLOWED_ALPHAS),
            ));
        }
        if !(self.target_power > 0.0 && self.target_power < 1.0) {
            return Err(invalid(
                "target_power",
                format!("{} must be strictly between 0 and 1", self.target_power),
            ));
        }
        if !self.mde_percent.is_finite() || self.mde_percent < -100.0 {
            return Err(invalid(
                "mde_percent",
                format!("{} must be finite and >= -100", self.mde_percent),
            ));
        }
        if self.num_emulations == 0 {
            return Err(invalid("num_emulations", "must be at least 1"));
        }
        if self.sample_size < 2 {
            return Err(invalid(
                "sample_size",
                format!("{} must be at least 2", self.sample_size),
            ));
        }
        if self.sample_step == 0 {
            return Err(invalid("sample_step", "must be at least 1"));
        }

        let max_sample_size = self.max_sample_size.unwrap_or(DEFAULT_MAX_SAMPLE_SIZE);
        if max_sample_size > SAMPLE_SIZE_HARD_CEILING {
            return Err(invalid(
                "max_sample_size",
                format!("{max_sample_size} exceeds the hard ceiling of {SAMPLE_SIZE_HARD_CEILING}"),
            ));
        }
        if self.sample_size > max_sample_size {
            return Err(invalid(
                "sample_size",
                format!(
                    "{} is above the sample-size ceiling {max_sample_size}",
                    self.sample_size
                ),
            ));
        }

        Ok(ExperimentConfig {
            alpha: self.alpha,
            target_power: self.target_power,
            mde_percent: self.mde_percent,
            statistic,
            test_method,
            num_emulations: self.num_emulations,
            sample_size: self.sample_size,
            sample_step: self.sample_step,
            seed: self.seed,
            max_sample_size,
        })
    }
}

/// Validated, immutable experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentConfig {
    alpha: f64,
    target_power: f64,
    mde_percent: f64,
    statistic: Statistic,
    test_method: TestMethod,
    num_emulations: usize,
    sample_size: usize,
    sample_step: usize,
    seed: Option<u64>,
    max_sample_size: usize,
}

impl TryFrom<ExperimentParams> for ExperimentConfig {
    type Error = ConfigError;

    fn try_from(params: ExperimentParams) -> Result<Self, Self::Error> {
        params.validate()
    }
}

impl ExperimentConfig {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn target_power(&self) -> f64 {
        self.target_power
    }

    pub fn mde_percent(&self) -> f64 {
        self.mde_percent
    }

    pub fn statistic(&self) -> Statistic {
        self.statistic
    }

    pub fn test_method(&self) -> TestMethod {
        self.test_method
    }

    pub fn num_emulations(&self) -> usize {
        self.num_emulations
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn sample_step(&self) -> usize {
        self.sample_step
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Largest sample size the search may test.
    pub fn max_sample_size(&self) -> usize {
        self.max_sample_size
    }

    pub fn effect_adder(&self) -> EffectAdder {
        self.statistic.effect_adder()
    }

    pub fn test_fn(&self) -> TestFn {
        self.test_method.function()
    }

    /// Number of sizes between `sample_size` and the ceiling, inclusive.
    /// The search never runs more steps than this.
    pub fn estimated_total_iterations(&self) -> usize {
        (self.max_sample_size - self.sample_size) / self.sample_step + 1
    }

    /// Same configuration with a different seed.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Back to the flat keyed form.
    pub fn to_params(&self) -> ExperimentParams {
        ExperimentParams {
            alpha: self.alpha,
            target_power: self.target_power,
            mde_percent: self.mde_percent,
            statistic: self.statistic.as_str().to_string(),
            test_method: self.test_method.as_str().to_string(),
            num_emulations: self.num_emulations,
            sample_size: self.sample_size,
            sample_step: self.sample_step,
            seed: self.seed,
            max_sample_size: Some(self.max_sample_size),
        }
    }
}
