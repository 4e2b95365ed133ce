//! MDE Lab Core: Monte Carlo sample-size search for A/B tests.
//!
//! Given historical observations of a metric, estimates the smallest
//! per-group sample size at which an experiment detects a relative effect
//! of a given size with a target probability:
//! - Empirical distribution built from the observations (rounded, alias-table draws)
//! - Statistic-aware effect injection
//! - Hypothesis test registry (t-test, two-proportion z-test)
//! - Stepwise power search over sample sizes, emulations on the rayon pool
//! - Deterministic seed hierarchy (same seed, same result, any thread count)
//! - Statistic bootstrap for inspecting sampling distributions

pub mod bootstrap;
pub mod config;
pub mod distribution;
pub mod effect;
pub mod engine;
pub mod rng;
pub mod stat_tests;

pub use config::{ConfigError, ExperimentConfig, ExperimentParams};
pub use distribution::{DistributionError, EmpiricalDistribution, Resample};
pub use effect::{get_effect_adder, EffectAdder, Statistic};
pub use engine::{
    run_experiment, run_experiment_from_params, EngineError, PowerPoint, PowerResult,
    ProgressEvent, StopReason,
};
pub use stat_tests::{get_test_method, TestError, TestFn, TestMethod, TestOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared with rayon workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Distribution
        require_send::<EmpiricalDistribution>();
        require_sync::<EmpiricalDistribution>();
        require_send::<distribution::DistributionRow>();
        require_sync::<distribution::DistributionRow>();

        // Config
        require_send::<ExperimentParams>();
        require_sync::<ExperimentParams>();
        require_send::<ExperimentConfig>();
        require_sync::<ExperimentConfig>();

        // RNG
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();

        // Engine types
        require_send::<PowerResult>();
        require_sync::<PowerResult>();
        require_send::<ProgressEvent>();
        require_sync::<ProgressEvent>();
        require_send::<EngineError>();
        require_sync::<EngineError>();

        // Bootstrap
        require_send::<bootstrap::BootstrapConfig>();
        require_sync::<bootstrap::BootstrapConfig>();
        require_send::<bootstrap::BootstrapResult>();
        require_sync::<bootstrap::BootstrapResult>();
    }

    /// Registry lookups by name behave like the functions their enums expose.
    #[test]
    fn registries_agree_with_enums() {
        let control = [0.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        let treatment = [1.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        for method in TestMethod::all() {
            let via_name = get_test_method(method.as_str()).unwrap();
            assert_eq!(
                via_name(&control, &treatment, 0.05),
                (method.function())(&control, &treatment, 0.05)
            );
        }
        for statistic in Statistic::all() {
            let via_name = get_effect_adder(statistic.as_str()).unwrap();
            assert_eq!(
                via_name(&control, 12.5),
                (statistic.effect_adder())(&control, 12.5)
            );
        }
    }
}
