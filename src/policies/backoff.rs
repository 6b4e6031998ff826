//! # Backoff policy for dial retries.
//!
//! [`BackoffPolicy`] controls how dial retry delays grow after repeated failures.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` (0-indexed) is `first × factor^n`, clamped to `max`.
//! The base delay is derived purely from the attempt number, so the `N`th
//! consecutive failure sleeps `min(first × factor^(N-1), max)`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use threadvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::doubling(Duration::from_secs(32));
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(1));
//! assert_eq!(backoff.next(1), Duration::from_secs(2));
//! assert_eq!(backoff.next(2), Duration::from_secs(4));
//! assert_eq!(backoff.next(10), Duration::from_secs(32));
//! ```

use std::time::Duration;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap for retries.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
}

impl Default for BackoffPolicy {
    /// Returns the dial default: `first = 1s`, `factor = 2.0`, `max = 32s`.
    fn default() -> Self {
        Self::doubling(Duration::from_secs(32))
    }
}

impl BackoffPolicy {
    /// One second, doubling, capped at `max`.
    pub fn doubling(max: Duration) -> Self {
        Self {
            first: Duration::from_secs(1),
            max,
            factor: 2.0,
        }
    }

    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// # Notes
    /// - If `factor` equals 1.0, delay remains constant at `first` (up to `max`).
    /// - If `factor` is greater than 1.0, delays grow exponentially up to `max`.
    /// - Overflowing or non-finite intermediate values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_zero_returns_first() {
        let policy = BackoffPolicy::doubling(Duration::from_secs(32));
        assert_eq!(policy.next(0), Duration::from_secs(1));
    }

    #[test]
    fn test_nth_failure_sleeps_power_of_two_capped() {
        for cap in [1u64, 5, 10, 32, 64] {
            let policy = BackoffPolicy::doubling(Duration::from_secs(cap));
            for n in 1u32..=12 {
                let expected = (1u64 << (n - 1)).min(cap);
                assert_eq!(
                    policy.next(n - 1),
                    Duration::from_secs(expected),
                    "cap={cap} failure #{n}"
                );
            }
        }
    }

    #[test]
    fn test_never_exceeds_cap_after_reaching_it() {
        let policy = BackoffPolicy::doubling(Duration::from_secs(10));
        let mut reached = false;
        for attempt in 0..64 {
            let d = policy.next(attempt);
            assert!(d <= Duration::from_secs(10));
            if d == Duration::from_secs(10) {
                reached = true;
            } else {
                assert!(!reached, "delay dropped below cap at attempt {attempt}");
            }
        }
    }

    #[test]
    fn test_constant_factor() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 1.0,
        };
        for attempt in 0..10 {
            assert_eq!(policy.next(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn test_first_exceeds_max() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_non_finite_overflow_clamps_to_max() {
        let policy = BackoffPolicy::doubling(Duration::from_secs(32));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(32));
    }
}
