//! Statistic bootstrap: sampling distributions of the control and treatment statistic.
//!
//! For a fixed sample size and MDE, draws `n_resamples` control samples and
//! `n_resamples` treatment samples (effect applied) from the distribution,
//! evaluates the statistic on each, and summarises both sampling
//! distributions. Shows how far apart the two distributions sit at a given
//! size, which is what the power search measures.
//!
//! Resamples run on the rayon pool and are seeded through the same
//! [`RngHierarchy`] as the power search, on a separate stream.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::distribution::Resample;
use crate::effect::Statistic;
use crate::rng::{RngHierarchy, BOOTSTRAP_STREAM};

// ─── Configuration ───────────────────────────────────────────────────

/// Configuration for a statistic bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Statistic name, resolved through the statistic registry.
    pub statistic: String,
    /// Per-group sample size of each resample.
    pub sample_size: usize,
    /// Relative effect applied to every treatment resample, in percent.
    pub mde_percent: f64,
    /// Number of resamples per group (default 1000).
    pub n_resamples: usize,
    /// Master seed; drawn from entropy when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            statistic: "mean".to_string(),
            sample_size: 1000,
            mde_percent: 1.0,
            n_resamples: 1000,
            seed: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Summary of one sampling distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingSummary {
    pub mean: f64,
    /// Population standard deviation of the resampled statistics.
    pub std_dev: f64,
    pub p2_5: f64,
    pub median: f64,
    pub p97_5: f64,
    /// Resampled statistic values in draw order.
    pub values: Vec<f64>,
}

/// Result of a statistic bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapResult {
    pub statistic: Statistic,
    pub sample_size: usize,
    pub mde_percent: f64,
    pub n_resamples: usize,
    pub control: SamplingSummary,
    pub treatment: SamplingSummary,
    /// Relative difference of the two summary means, in percent.
    /// NaN when the control mean is zero.
    pub observed_shift_percent: f64,
    pub seed: u64,
}

/// Errors from the statistic bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("n_resamples must be at least 1")]
    NoResamples,
    #[error("sample size must be at least 1, got {0}")]
    InvalidSampleSize(usize),
}

// ─── Bootstrap ───────────────────────────────────────────────────────

/// Resample the statistic for control and treatment groups.
pub fn bootstrap_statistic<S: Resample>(
    source: &S,
    config: &BootstrapConfig,
) -> Result<BootstrapResult, BootstrapError> {
    let statistic: Statistic = config.statistic.parse()?;
    if config.n_resamples == 0 {
        return Err(BootstrapError::NoResamples);
    }
    if config.sample_size == 0 {
        return Err(BootstrapError::InvalidSampleSize(config.sample_size));
    }
    if !config.mde_percent.is_finite() || config.mde_percent < -100.0 {
        return Err(ConfigError::Invalid {
            field: "mde_percent",
            reason: format!("must be finite and >= -100, got {}", config.mde_percent),
        }
        .into());
    }

    let rng_hierarchy = match config.seed {
        Some(seed) => RngHierarchy::new(seed),
        None => RngHierarchy::from_entropy(),
    };
    let effect_adder = statistic.effect_adder();

    let (control, treatment): (Vec<f64>, Vec<f64>) = (0..config.n_resamples)
        .into_par_iter()
        .map(|i| {
            let mut rng = rng_hierarchy.rng_for(BOOTSTRAP_STREAM, config.sample_size, i);
            let control = source.sample(&mut rng, config.sample_size);
            let treatment = effect_adder(
                &source.sample(&mut rng, config.sample_size),
                config.mde_percent,
            );
            (statistic.compute(&control), statistic.compute(&treatment))
        })
        .unzip();

    let control = summarize(control);
    let treatment = summarize(treatment);
    let observed_shift_percent = if control.mean == 0.0 {
        f64::NAN
    } else {
        (treatment.mean / control.mean - 1.0) * 100.0
    };

    Ok(BootstrapResult {
        statistic,
        sample_size: config.sample_size,
        mde_percent: config.mde_percent,
        n_resamples: config.n_resamples,
        control,
        treatment,
        observed_shift_percent,
        seed: rng_hierarchy.master_seed(),
    })
}

fn summarize(values: Vec<f64>) -> SamplingSummary {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);

    SamplingSummary {
        mean,
        std_dev: variance.sqrt(),
        p2_5: percentile_sorted(&sorted, 2.5),
        median: percentile_sorted(&sorted, 50.0),
        p97_5: percentile_sorted(&sorted, 97.5),
        values,
    }
}

/// Percentile (0-100) of sorted data, linear interpolation between ranks.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
