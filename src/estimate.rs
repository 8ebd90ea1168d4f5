//! Progress estimation for an opaque remote call.
//!
//! The conversion service reports no progress, so the controller asks a
//! [`ProgressEstimator`] for a new value on every tick while the call is
//! outstanding. Whatever the estimator returns, the controller keeps the
//! value non-decreasing and below [`OUTSTANDING_CEILING`]; the band from
//! [`FINALIZING_PROGRESS`] up to 100 belongs to the controller alone.
//!
//! A real progress channel can replace [`SimulatedProgress`] by implementing
//! the trait; the state machine does not change.

use rand::Rng;
use std::time::Duration;

/// Progress reported once the service has answered successfully and the
/// payload is being delivered.
pub const FINALIZING_PROGRESS: f64 = 90.0;

/// Highest value an estimate may take while the call is still outstanding.
/// Strictly below [`FINALIZING_PROGRESS`].
pub const OUTSTANDING_CEILING: f64 = 89.9;

/// Produces progress estimates while the conversion call is outstanding.
pub trait ProgressEstimator: Send + Sync {
    /// How often [`Self::next`] is consulted.
    fn tick_interval(&self) -> Duration;

    /// Next estimate given the current one.
    fn next(&self, current: f64) -> f64;
}

/// Time-driven random walk: every tick adds a uniform increment in
/// `[0, max_increment)`.
#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    interval: Duration,
    max_increment: f64,
}

impl SimulatedProgress {
    pub fn new(interval: Duration, max_increment: f64) -> Self {
        Self {
            interval,
            max_increment,
        }
    }
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), 10.0)
    }
}

impl ProgressEstimator for SimulatedProgress {
    fn tick_interval(&self) -> Duration {
        self.interval
    }

    fn next(&self, current: f64) -> f64 {
        if self.max_increment <= 0.0 {
            return current;
        }
        current + rand::rng().random_range(0.0..self.max_increment)
    }
}

/// Apply an estimator's proposal under the outstanding-call rules:
/// never below `current`, never at or above [`FINALIZING_PROGRESS`].
pub(crate) fn clamp_outstanding(current: f64, proposed: f64) -> f64 {
    if proposed.is_nan() {
        return current;
    }
    proposed.min(OUTSTANDING_CEILING).max(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_steps_stay_within_increment() {
        let est = SimulatedProgress::new(Duration::from_millis(200), 10.0);
        for _ in 0..1000 {
            let next = est.next(20.0);
            assert!((20.0..30.0).contains(&next), "got {next}");
        }
    }

    #[test]
    fn zero_increment_holds_value() {
        let est = SimulatedProgress::new(Duration::from_millis(10), 0.0);
        assert_eq!(est.next(33.0), 33.0);
    }

    #[test]
    fn clamp_never_reaches_finalizing_band() {
        assert_eq!(clamp_outstanding(85.0, 97.0), OUTSTANDING_CEILING);
        assert!(clamp_outstanding(89.0, 1000.0) < FINALIZING_PROGRESS);
    }

    #[test]
    fn clamp_is_non_decreasing() {
        assert_eq!(clamp_outstanding(40.0, 10.0), 40.0);
        assert_eq!(clamp_outstanding(40.0, f64::NAN), 40.0);
        assert_eq!(clamp_outstanding(40.0, 45.5), 45.5);
    }

    #[test]
    fn walk_saturates_below_ceiling() {
        let est = SimulatedProgress::default();
        let mut p = 0.0;
        for _ in 0..500 {
            let next = clamp_outstanding(p, est.next(p));
            assert!(next >= p);
            p = next;
        }
        assert!(p < FINALIZING_PROGRESS);
    }
}
