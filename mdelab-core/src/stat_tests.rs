//! Two-sample significance tests.
//!
//! Every test shares one signature: `(control, treatment, alpha) →
//! TestOutcome`, with `is_significant == (p_value < alpha)`. Tests are plain
//! functions with no shared state, so the power search calls them from many
//! worker threads at once.
//!
//! - `t_test`: Student's two-sample t-test, pooled variance, two-sided.
//! - `z_proportion_test`: pooled two-proportion z-test, two-sided. Counts are
//!   `sum(sample)`, sizes are `len(sample)`; intended for 0/1 metrics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use thiserror::Error;

use crate::config::ConfigError;

/// Signature shared by all registered tests.
pub type TestFn = fn(&[f64], &[f64], f64) -> Result<TestOutcome, TestError>;

/// Above this many degrees of freedom the t tail is taken from the standard
/// normal (the two agree to ~1e-4 relative there).
const NORMAL_APPROX_DF: f64 = 20_000.0;

/// Result of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Test statistic (t or z).
    pub statistic: f64,
    /// Two-sided p-value in [0, 1].
    pub p_value: f64,
    /// `p_value < alpha`.
    pub is_significant: bool,
}

/// Numeric failures inside a test.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TestError {
    #[error("need at least {required} observations per group, got {control} and {treatment}")]
    TooFewObservations {
        required: usize,
        control: usize,
        treatment: usize,
    },
    #[error("test statistic undefined: zero variance")]
    ZeroVariance,
    #[error("pooled proportion {0} outside [0, 1] (proportion tests need 0/1-valued data)")]
    InvalidProportion(f64),
    #[error("distribution error: {0}")]
    Distribution(String),
}

/// Registered hypothesis tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    TTest,
    ZProportionTest,
}

/// Name → test lookup table. `z_test` is the short name used by older configs.
const TEST_METHODS: &[(&str, TestMethod)] = &[
    ("t_test", TestMethod::TTest),
    ("z_proportion_test", TestMethod::ZProportionTest),
    ("z_test", TestMethod::ZProportionTest),
];

impl TestMethod {
    /// Every registered test (aliases excluded).
    pub fn all() -> [TestMethod; 2] {
        [TestMethod::TTest, TestMethod::ZProportionTest]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestMethod::TTest => "t_test",
            TestMethod::ZProportionTest => "z_proportion_test",
        }
    }

    pub fn function(&self) -> TestFn {
        match self {
            TestMethod::TTest => t_test,
            TestMethod::ZProportionTest => z_proportion_test,
        }
    }

    /// Whether the test is only defined for 0/1-valued data.
    pub fn requires_binary(&self) -> bool {
        matches!(self, TestMethod::ZProportionTest)
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMethod {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        TEST_METHODS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, m)| m)
            .ok_or_else(|| ConfigError::UnknownTestMethod(name.to_string()))
    }
}

/// Look up a test function by name.
pub fn get_test_method(name: &str) -> Result<TestFn, ConfigError> {
    name.parse::<TestMethod>().map(|m| m.function())
}

// ─── Test implementations ────────────────────────────────────────────

/// Student's two-sample t-test (equal variances), two-sided.
pub fn t_test(control: &[f64], treatment: &[f64], alpha: f64) -> Result<TestOutcome, TestError> {
    let (n1, n2) = (control.len(), treatment.len());
    if n1 < 2 || n2 < 2 {
        return Err(TestError::TooFewObservations {
            required: 2,
            control: n1,
            treatment: n2,
        });
    }

    let (m1, ss1) = mean_and_sum_sq(control);
    let (m2, ss2) = mean_and_sum_sq(treatment);
    let df = (n1 + n2 - 2) as f64;
    let pooled_var = (ss1 + ss2) / df;
    let std_err = (pooled_var * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();

    if ss1 + ss2 == 0.0 || !std_err.is_finite() || std_err == 0.0 {
        return Err(TestError::ZeroVariance);
    }

    let t = (m1 - m2) / std_err;
    let p_value = two_sided_t_p_value(t, df)?;
    Ok(outcome(t, p_value, alpha))
}

/// Pooled two-proportion z-test, two-sided.
pub fn z_proportion_test(
    control: &[f64],
    treatment: &[f64],
    alpha: f64,
) -> Result<TestOutcome, TestError> {
    let (n1, n2) = (control.len(), treatment.len());
    if n1 == 0 || n2 == 0 {
        return Err(TestError::TooFewObservations {
            required: 1,
            control: n1,
            treatment: n2,
        });
    }

    let count1: f64 = control.iter().sum();
    let count2: f64 = treatment.iter().sum();
    let (n1, n2) = (n1 as f64, n2 as f64);

    let pooled = (count1 + count2) / (n1 + n2);
    if !(0.0..=1.0).contains(&pooled) {
        return Err(TestError::InvalidProportion(pooled));
    }

    let variance = pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2);
    if variance.is_nan() || variance <= 0.0 {
        return Err(TestError::ZeroVariance);
    }

    let z = (count1 / n1 - count2 / n2) / variance.sqrt();
    let p_value = two_sided_normal_p_value(z)?;
    Ok(outcome(z, p_value, alpha))
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn outcome(statistic: f64, p_value: f64, alpha: f64) -> TestOutcome {
    let p_value = p_value.clamp(0.0, 1.0);
    TestOutcome {
        statistic,
        p_value,
        is_significant: p_value < alpha,
    }
}

/// Mean and sum of squared deviations (two-pass).
fn mean_and_sum_sq(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss = values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>();
    (mean, ss)
}

fn two_sided_t_p_value(t: f64, df: f64) -> Result<f64, TestError> {
    if df > NORMAL_APPROX_DF {
        return two_sided_normal_p_value(t);
    }
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| TestError::Distribution(e.to_string()))?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

fn two_sided_normal_p_value(z: f64) -> Result<f64, TestError> {
    let dist = Normal::new(0.0, 1.0).map_err(|e| TestError::Distribution(e.to_string()))?;
    Ok((2.0 * dist.sf(z.abs())).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_test_known_value() {
        // Equal variances 2.5, mean difference -1, se = 1, df = 8.
        let control = [1.0, 2.0, 3.0, 4.0, 5.0];
        let treatment = [2.0, 3.0, 4.0, 5.0, 6.0];
        let out = t_test(&control, &treatment, 0.05).unwrap();
        assert!((out.statistic + 1.0).abs() < 1e-12);
        assert!((out.p_value - 0.3466).abs() < 1e-3, "p = {}", out.p_value);
        assert!(!out.is_significant);
    }

    #[test]
    fn t_test_clear_difference_is_significant() {
        let control: Vec<f64> = (0..50).map(|i| 10.0 + (i % 5) as f64 * 0.1).collect();
        let treatment: Vec<f64> = control.iter().map(|x| x + 1.0).collect();
        let out = t_test(&control, &treatment, 0.01).unwrap();
        assert!(out.p_value < 1e-10);
        assert!(out.is_significant);
    }

    #[test]
    fn t_test_identical_samples() {
        let sample = [1.0, 2.0, 3.0, 4.0];
        let out = t_test(&sample, &sample, 0.05).unwrap();
        assert!(out.statistic.abs() < 1e-12);
        assert!((out.p_value - 1.0).abs() < 1e-9);
        assert!(!out.is_significant);
    }

    #[test]
    fn t_test_zero_variance_is_an_error() {
        assert_eq!(
            t_test(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0], 0.05).unwrap_err(),
            TestError::ZeroVariance
        );
        assert_eq!(
            t_test(&[0.1; 4], &[0.1; 4], 0.05).unwrap_err(),
            TestError::ZeroVariance
        );
    }

    #[test]
    fn t_test_small_spread_on_large_level() {
        // Spread of 0.04 around 1e10: tiny next to the mean but real.
        let control: Vec<f64> = (0..100).map(|i| 1e10 + (i % 5) as f64 * 0.01).collect();
        let treatment: Vec<f64> = control.iter().map(|x| x + 0.02).collect();
        let out = t_test(&control, &treatment, 0.05).unwrap();
        assert!(out.statistic < -9.0 && out.statistic > -11.0, "t = {}", out.statistic);
        assert!(out.is_significant);
    }

    #[test]
    fn t_test_too_few_observations() {
        assert!(matches!(
            t_test(&[1.0], &[1.0, 2.0], 0.05),
            Err(TestError::TooFewObservations { required: 2, .. })
        ));
    }

    #[test]
    fn large_df_uses_normal_tail() {
        let p = two_sided_t_p_value(1.959964, 1.0e6).unwrap();
        assert!((p - 0.05).abs() < 1e-4);
        let p_small = two_sided_t_p_value(1.959964, 10_000.0).unwrap();
        assert!((p_small - 0.05).abs() < 1e-3);
    }

    #[test]
    fn z_test_known_value() {
        // 50/100 vs 65/100: pooled 0.575, z ≈ -2.1456, p ≈ 0.0319
        let control: Vec<f64> = (0..100).map(|i| if i < 50 { 1.0 } else { 0.0 }).collect();
        let treatment: Vec<f64> = (0..100).map(|i| if i < 65 { 1.0 } else { 0.0 }).collect();
        let out = z_proportion_test(&control, &treatment, 0.05).unwrap();
        assert!((out.statistic + 2.1456).abs() < 1e-3);
        assert!((out.p_value - 0.0319).abs() < 1e-3, "p = {}", out.p_value);
        assert!(out.is_significant);
    }

    #[test]
    fn z_test_all_zero_is_zero_variance() {
        assert_eq!(
            z_proportion_test(&[0.0; 10], &[0.0; 10], 0.05).unwrap_err(),
            TestError::ZeroVariance
        );
    }

    #[test]
    fn z_test_rejects_non_binary_mass() {
        assert!(matches!(
            z_proportion_test(&[2.0, 2.0], &[2.0, 2.0], 0.05),
            Err(TestError::InvalidProportion(_))
        ));
    }

    #[test]
    fn significance_matches_p_value() {
        let control = [1.0, 2.0, 3.0, 4.0, 5.0];
        let treatment = [2.0, 3.0, 4.0, 5.0, 6.0];
        for alpha in [0.01, 0.05, 0.1, 0.5] {
            let out = t_test(&control, &treatment, alpha).unwrap();
            assert_eq!(out.is_significant, out.p_value < alpha);
        }
    }

    #[test]
    fn registry_lookup() {
        assert_eq!("t_test".parse::<TestMethod>().unwrap(), TestMethod::TTest);
        assert_eq!(
            "z_proportion_test".parse::<TestMethod>().unwrap(),
            TestMethod::ZProportionTest
        );
        assert_eq!(
            "z_test".parse::<TestMethod>().unwrap(),
            TestMethod::ZProportionTest
        );
        assert!(get_test_method("t_test").is_ok());
    }

    #[test]
    fn registry_unknown_name() {
        match get_test_method("bogus_test") {
            Err(ConfigError::UnknownTestMethod(name)) => assert_eq!(name, "bogus_test"),
            Err(other) => panic!("expected UnknownTestMethod, got {other:?}"),
            Ok(_) => panic!("expected UnknownTestMethod, got a test function"),
        }
    }

    #[test]
    fn method_serializes_to_registry_name() {
        for method in TestMethod::all() {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
        }
    }
}
