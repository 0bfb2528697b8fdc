//! Bounded retry with per-attempt timeout and backoff.
//!
//! [`retry`] runs an async operation up to [`RetryPolicy::max_attempts`]
//! times. Each attempt is bounded by [`RetryPolicy::attempt_timeout`]; a
//! timed-out attempt counts as a failed attempt. Between attempts the
//! policy's [`DelayStrategy`] decides how long to sleep. No sleep happens
//! after the final attempt.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use svcwarden_core::ReadinessSettings;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Delay between consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayStrategy {
    /// Retry immediately.
    None,
    /// Same delay after every failure.
    Fixed(Duration),
    /// `first × factor^n`, clamped to `max`.
    Exponential {
        first: Duration,
        max: Duration,
        factor: f64,
    },
}

impl DelayStrategy {
    /// Delay after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => delay,
            Self::Exponential { first, max, factor } => {
                let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
                let secs = first.as_secs_f64() * factor.powi(exp);
                if !secs.is_finite() || secs < 0.0 || secs > max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

/// Attempt budget, per-attempt timeout and delay strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub delay: DelayStrategy,
}

impl RetryPolicy {
    /// Policy with a fixed delay between attempts.
    pub const fn fixed(max_attempts: u32, attempt_timeout: Duration, delay: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
            delay: DelayStrategy::Fixed(delay),
        }
    }
}

impl From<&ReadinessSettings> for RetryPolicy {
    fn from(settings: &ReadinessSettings) -> Self {
        // A unit factor keeps the delay constant; anything above grows it.
        #[allow(clippy::float_cmp)]
        let delay = if settings.delay_ms == 0 {
            DelayStrategy::None
        } else if settings.backoff_factor == 1.0 {
            DelayStrategy::Fixed(settings.delay())
        } else {
            DelayStrategy::Exponential {
                first: settings.delay(),
                max: settings.max_delay(),
                factor: settings.backoff_factor,
            }
        };

        Self {
            max_attempts: settings.max_attempts,
            attempt_timeout: settings.attempt_timeout(),
            delay,
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// The attempt did not finish within the per-attempt timeout.
    TimedOut(Duration),
    /// The attempt returned an error.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
            Self::Failed(err) => err.fmt(f),
        }
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// Attempts made (equal to the effective budget).
    pub attempts: u32,
    /// Failure of the final attempt.
    pub last: AttemptError<E>,
}

/// Run `op` until it succeeds or the budget is spent.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let failure = match timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => AttemptError::Failed(err),
            Err(_) => AttemptError::TimedOut(policy.attempt_timeout),
        };

        if attempt >= max_attempts {
            return Err(RetryExhausted {
                attempts: attempt,
                last: failure,
            });
        }

        let delay = policy.delay.delay_for(attempt - 1);
        debug!(
            attempt,
            max_attempts,
            ?delay,
            error = %failure,
            "Attempt failed, retrying"
        );
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(
            max_attempts,
            Duration::from_millis(500),
            Duration::from_millis(100),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_exactly_max_attempts() {
        for max_attempts in 1..=6 {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);

            let result: Result<(), _> = retry(&policy(max_attempts), |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("refused")
                }
            })
            .await;

            let err = result.unwrap_err();
            assert_eq!(err.attempts, max_attempts);
            assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            assert_eq!(err.last, AttemptError::Failed("refused"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_still_attempts_once() {
        let result: Result<(), _> = retry(&policy(0), |_| async { Err::<(), _>("down") }).await;
        assert_eq!(result.unwrap_err().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_on_first_success() {
        let result = retry(&policy(5), |attempt| async move {
            if attempt < 3 { Err("not yet") } else { Ok(attempt) }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let policy = RetryPolicy {
            max_attempts: 2,
            attempt_timeout: Duration::from_millis(50),
            delay: DelayStrategy::None,
        };

        let result: Result<(), RetryExhausted<&str>> = retry(&policy, |_| async {
            sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.last, AttemptError::TimedOut(Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_only() {
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = retry(&policy(3), |_| async { Err::<(), _>("x") }).await;
        // Two gaps of 100ms for three attempts.
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_exponential_growth_is_clamped() {
        let delay = DelayStrategy::Exponential {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
        };
        assert_eq!(delay.delay_for(0), Duration::from_millis(100));
        assert_eq!(delay.delay_for(1), Duration::from_millis(200));
        assert_eq!(delay.delay_for(3), Duration::from_millis(800));
        assert_eq!(delay.delay_for(4), Duration::from_secs(1));
        assert_eq!(delay.delay_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_policy_from_settings() {
        let mut settings = ReadinessSettings::default();
        let fixed = RetryPolicy::from(&settings);
        assert_eq!(fixed.max_attempts, 5);
        assert_eq!(fixed.delay, DelayStrategy::Fixed(Duration::from_secs(1)));

        settings.backoff_factor = 2.0;
        assert!(matches!(
            RetryPolicy::from(&settings).delay,
            DelayStrategy::Exponential { .. }
        ));

        settings.delay_ms = 0;
        assert_eq!(RetryPolicy::from(&settings).delay, DelayStrategy::None);
    }
}
