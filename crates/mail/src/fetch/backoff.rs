//! Retry with exponential backoff and jitter
//!
//! The policy holds no mutable state, so every fetch worker can run its own
//! retries through a shared copy without coordination.

use log::{debug, info};
use rand::Rng;
use std::fmt::Display;
use std::time::Duration;

/// Jitter is drawn uniformly from `[0, delay * MAX_JITTER_FRACTION)`
const MAX_JITTER_FRACTION: f64 = 0.1;

/// Errors that know whether repeating the call may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff with a retry-count ceiling
///
/// Attempt `n` (1-based) that fails is followed by a sleep of
/// `min(base_delay * 2^(n-1), max_delay)` plus up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempt budget, including the first call (treated as at least 1)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay after the given failed attempt, before jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay after the given failed attempt, with jitter applied
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        let fraction = rand::rng().random_range(0.0..MAX_JITTER_FRACTION);
        delay + delay.mul_f64(fraction)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent
    ///
    /// The last error is returned unchanged. Sleeping blocks only the
    /// calling thread.
    pub fn execute<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_retries.max(1);
        let mut attempt = 0;

        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;

                    if !err.is_retryable() {
                        debug!("Attempt {} failed with non-retryable error: {}", attempt, err);
                        return Err(err);
                    }

                    if attempt >= max_attempts {
                        debug!("Giving up after {} attempts: {}", attempt, err);
                        return Err(err);
                    }

                    let delay = self.jittered_delay(attempt);
                    info!(
                        "Attempt {} failed with error: {}. Retrying in {:.2?}...",
                        attempt, err, delay
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fast_policy(max_retries: u32) -> BackoffPolicy {
        BackoffPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn test_success_on_first_attempt() {
        let calls = Cell::new(0);
        let result: Result<u32, TestError> = fast_policy(3).execute(|| {
            calls.set(calls.get() + 1);
            Ok(7)
        });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_two_failures_then_success() {
        let calls = Cell::new(0);
        let result = fast_policy(3).execute(|| {
            calls.set(calls.get() + 1);
            if calls.get() <= 2 {
                Err(TestError { retryable: true })
            } else {
                Ok("page")
            }
        });

        assert_eq!(result.unwrap(), "page");
        // Two retries after the initial call
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_exhausted_budget_returns_last_error() {
        let calls = Cell::new(0);
        let result: Result<(), TestError> = fast_policy(3).execute(|| {
            calls.set(calls.get() + 1);
            Err(TestError { retryable: true })
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_non_retryable_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), TestError> = fast_policy(5).execute(|| {
            calls.set(calls.get() + 1);
            Err(TestError { retryable: false })
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_zero_budget_still_calls_once() {
        let calls = Cell::new(0);
        let _: Result<(), TestError> = fast_policy(0).execute(|| {
            calls.set(calls.get() + 1);
            Err(TestError { retryable: true })
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = BackoffPolicy::new(10, Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(32));
        assert_eq!(policy.delay_for(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for(200), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_is_monotonic_and_bounded() {
        let policy = BackoffPolicy::new(50, Duration::from_millis(250), Duration::from_secs(30));
        let ceiling = policy.max_delay.mul_f64(1.0 + MAX_JITTER_FRACTION);

        let mut previous = Duration::ZERO;
        for attempt in 1..50 {
            let base = policy.delay_for(attempt);
            assert!(base >= previous, "attempt {attempt} decreased");
            assert!(base <= policy.max_delay);
            previous = base;

            let jittered = policy.jittered_delay(attempt);
            assert!(jittered >= base);
            assert!(jittered <= ceiling, "attempt {attempt} exceeded ceiling");
        }
    }
}
