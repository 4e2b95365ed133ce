//! Timing scopes for the CLI's expensive phases.
//!
//! Off unless `MDELAB_PROFILE=1` (or `true`) is set. When enabled, each
//! [`ProfileScope`] prints `[PROFILE] <name> took <ms>ms` to stderr on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static PROFILING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Read `MDELAB_PROFILE` once at startup.
pub fn init() {
    let enabled = std::env::var("MDELAB_PROFILE")
        .map(|v| is_truthy(&v))
        .unwrap_or(false);

    PROFILING_ENABLED.store(enabled, Ordering::Relaxed);

    if enabled {
        eprintln!("[PROFILING] Enabled (MDELAB_PROFILE=1)");
    }
}

#[inline]
pub fn is_enabled() -> bool {
    PROFILING_ENABLED.load(Ordering::Relaxed)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Measures the time until it is dropped.
pub struct ProfileScope {
    name: &'static str,
    start: Instant,
}

impl ProfileScope {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if is_enabled() {
            eprintln!(
                "[PROFILE] {} took {:.3}ms",
                self.name,
                self.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}
