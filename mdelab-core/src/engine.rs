//! Power search: Monte Carlo estimate of the sample size needed to detect an MDE.
//!
//! The search is a small state machine over the per-group sample size:
//!
//! 1. Draw `num_emulations` independent (control, treatment) pairs of the
//!    current size, inject the effect into each treatment draw, run the test.
//! 2. Power at this size = significant / `num_emulations`.
//! 3. Stop when power reaches the target, when a cancel flag is raised, or
//!    when the next size would pass the ceiling. Otherwise step up.
//!
//! Emulations within a step run on the rayon pool. Each emulation has its own
//! RNG derived from the master seed, so a seeded run gives the same result on
//! any number of threads. Power is not assumed to be monotone in the sample
//! size; only the threshold is checked at each step.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, ExperimentConfig, ExperimentParams};
use crate::distribution::Resample;
use crate::effect::EffectAdder;
use crate::rng::{RngHierarchy, POWER_STREAM};
use crate::stat_tests::{TestError, TestFn, TestMethod};

/// Errors from the power search.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("degenerate distribution for {test}: {reason}")]
    DegenerateDistribution { test: TestMethod, reason: String },
    #[error("simulation failed at sample size {sample_size}, emulation {emulation}: {source}")]
    Simulation {
        sample_size: usize,
        emulation: usize,
        #[source]
        source: TestError,
    },
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last tested size reached the target power.
    TargetReached,
    /// The next size would have exceeded the sample-size ceiling.
    CeilingReached,
    /// The cancel flag was raised between steps.
    Cancelled,
}

/// Estimated power at one sample size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerPoint {
    pub sample_size: usize,
    pub power: f64,
}

/// Progress update emitted once per tested sample size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current_size: usize,
    pub power: f64,
    pub target_power: f64,
    /// Zero-based index of this step.
    pub iteration_index: usize,
    /// Steps needed to reach the ceiling (an upper bound on the run length).
    pub estimated_total_iterations: usize,
}

/// Outcome of a power search: one point per tested size, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerResult {
    pub points: Vec<PowerPoint>,
    pub target_power: f64,
    pub stop_reason: StopReason,
    /// Master seed the run used (replays the run when set on the config).
    pub seed: u64,
}

impl PowerResult {
    /// Last tested point. `None` only for a result that never ran a step.
    pub fn last(&self) -> Option<&PowerPoint> {
        self.points.last()
    }

    /// Whether the last tested size met the target power.
    pub fn reached_target(&self) -> bool {
        self.last().is_some_and(|p| p.power >= self.target_power)
    }

    /// The smallest tested size that met the target, if the search succeeded.
    pub fn required_sample_size(&self) -> Option<usize> {
        if self.reached_target() {
            self.last().map(|p| p.sample_size)
        } else {
            None
        }
    }

    pub fn sample_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.points.iter().map(|p| p.sample_size)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Validate raw parameters, then run the search.
///
/// Configuration errors (unknown statistic or test, out-of-range fields) are
/// returned before anything is drawn from `source`.
pub fn run_experiment_from_params<S: Resample>(
    source: &S,
    params: &ExperimentParams,
    progress_cb: Option<&dyn Fn(&ProgressEvent)>,
    cancel: Option<&AtomicBool>,
) -> Result<PowerResult, EngineError> {
    let config = params.validate()?;
    run_experiment(source, &config, progress_cb, cancel)
}

/// Run the sample-size search on a validated configuration.
///
/// # Arguments
/// - `source`: read-only distribution shared by all emulations.
/// - `config`: validated experiment configuration.
/// - `progress_cb`: called once per tested size, in order, on the calling thread.
/// - `cancel`: checked between sizes; a raised flag ends the run after the
///   current step with [`StopReason::Cancelled`].
///
/// Any test failure aborts the whole run; no partial estimate is returned.
pub fn run_experiment<S: Resample>(
    source: &S,
    config: &ExperimentConfig,
    progress_cb: Option<&dyn Fn(&ProgressEvent)>,
    cancel: Option<&AtomicBool>,
) -> Result<PowerResult, EngineError> {
    check_support(source.support(), config.test_method())?;

    let rng_hierarchy = match config.seed() {
        Some(seed) => RngHierarchy::new(seed),
        None => RngHierarchy::from_entropy(),
    };
    let step = Step {
        effect_adder: config.effect_adder(),
        test_fn: config.test_fn(),
        alpha: config.alpha(),
        mde_percent: config.mde_percent(),
        num_emulations: config.num_emulations(),
    };
    let estimated_total_iterations = config.estimated_total_iterations();

    let mut points = Vec::new();
    let mut size = config.sample_size();
    let mut iteration: usize = 0;

    let stop_reason = loop {
        let power = step.estimate_power(source, &rng_hierarchy, size)?;
        points.push(PowerPoint {
            sample_size: size,
            power,
        });

        if let Some(cb) = progress_cb {
            cb(&ProgressEvent {
                current_size: size,
                power,
                target_power: config.target_power(),
                iteration_index: iteration,
                estimated_total_iterations,
            });
        }

        if power >= config.target_power() {
            break StopReason::TargetReached;
        }
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            break StopReason::Cancelled;
        }
        match size.checked_add(config.sample_step()) {
            Some(next) if next <= config.max_sample_size() => size = next,
            _ => break StopReason::CeilingReached,
        }
        iteration += 1;
    };

    Ok(PowerResult {
        points,
        target_power: config.target_power(),
        stop_reason,
        seed: rng_hierarchy.master_seed(),
    })
}

/// Reject distributions the configured test cannot handle.
fn check_support(support: &[f64], test: TestMethod) -> Result<(), EngineError> {
    if support.len() < 2 {
        return Err(EngineError::DegenerateDistribution {
            test,
            reason: format!(
                "{} distinct value(s); every draw would have zero variance",
                support.len()
            ),
        });
    }
    if test.requires_binary() {
        if let Some(v) = support.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(EngineError::DegenerateDistribution {
                test,
                reason: format!("value {v} is not 0 or 1"),
            });
        }
    }
    Ok(())
}

/// Everything one sample-size step needs, resolved once per run.
struct Step {
    effect_adder: EffectAdder,
    test_fn: TestFn,
    alpha: f64,
    mde_percent: f64,
    num_emulations: usize,
}

impl Step {
    /// Fraction of emulations at `size` that reach significance.
    fn estimate_power<S: Resample>(
        &self,
        source: &S,
        rng_hierarchy: &RngHierarchy,
        size: usize,
    ) -> Result<f64, EngineError> {
        let significant = (0..self.num_emulations)
            .into_par_iter()
            .map(|emulation| -> Result<usize, EngineError> {
                let mut rng = rng_hierarchy.rng_for(POWER_STREAM, size, emulation);
                let control = source.sample(&mut rng, size);
                let treatment =
                    (self.effect_adder)(&source.sample(&mut rng, size), self.mde_percent);
                let outcome = (self.test_fn)(&control, &treatment, self.alpha).map_err(|err| {
                    EngineError::Simulation {
                        sample_size: size,
                        emulation,
                        source: err,
                    }
                })?;
                Ok(usize::from(outcome.is_significant))
            })
            .try_reduce(|| 0, |a, b| Ok(a + b))?;

        Ok(significant as f64 / self.num_emulations as f64)
    }
}
