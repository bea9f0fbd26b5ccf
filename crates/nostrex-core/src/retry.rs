//! Bounded retry primitive
//!
//! Every "try N times, sleep between attempts" loop in nostrex goes through
//! [`retry`]. The outcome is a tagged value rather than an error so callers
//! can see how many attempts were spent.

use core::fmt::Display;
use core::future::Future;
use core::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Retry Policy
// ----------------------------------------------------------------------------

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub interval: Duration,
    /// Delay multiplier per failed attempt (1.0 = fixed spacing)
    pub backoff_multiplier: f32,
    /// Upper bound on any single delay
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// Fixed spacing between attempts
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff_multiplier: 1.0,
            max_interval: interval,
        }
    }

    /// Single attempt, no sleeping
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

/// Delay schedule derived from a [`RetryPolicy`]
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    current_delay: Duration,
    attempt_count: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        let current_delay = policy.interval;
        Self {
            policy,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait after a failed attempt, `None` once attempts are spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt_count += 1;
        if self.attempt_count >= self.policy.max_attempts.max(1) {
            return None;
        }

        let delay = self.current_delay.min(self.policy.max_interval);
        let next_delay_millis =
            (self.current_delay.as_millis() as f32 * self.policy.backoff_multiplier) as u64;
        self.current_delay = Duration::from_millis(
            next_delay_millis.min(self.policy.max_interval.as_millis() as u64),
        );

        Some(delay)
    }

    /// Attempts made so far
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}

// ----------------------------------------------------------------------------
// Retry Outcome
// ----------------------------------------------------------------------------

/// Result of a bounded retry loop
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// Run `operation` until it succeeds or the policy is exhausted
///
/// The closure receives the 1-based attempt number. Sleeps happen only
/// between attempts, never after the last one.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut backoff = Backoff::new(policy.clone());

    loop {
        let attempt = backoff.attempt_count() + 1;
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", label, attempt);
                }
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(e) => match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        "{} attempt {}/{} failed, retrying in {:?}: {}",
                        label, attempt, policy.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!("{} failed after {} attempts: {}", label, attempt, e);
                    return RetryOutcome::Exhausted {
                        last_error: e,
                        attempts: attempt,
                    };
                }
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let outcome = retry(&RetryPolicy::default(), "flaky", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err("not yet")
                } else {
                    Ok(attempt * 10)
                }
            }
        })
        .await;

        assert_eq!(
            outcome,
            RetryOutcome::Succeeded {
                value: 30,
                attempts: 3
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_without_trailing_sleep() {
        let started = Instant::now();
        let outcome: RetryOutcome<(), &str> =
            retry(&RetryPolicy::default(), "broken", |_| async { Err("down") }).await;

        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                last_error: "down",
                attempts: 3
            }
        );
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let outcome: RetryOutcome<(), &str> =
            retry(&RetryPolicy::once(), "once", |_| async { Err("nope") }).await;
        assert_eq!(outcome.attempts(), 1);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_backoff_multiplier_is_capped() {
        let mut backoff = Backoff::new(RetryPolicy {
            backoff_multiplier: 2.0,
            max_interval: Duration::from_millis(300),
            ..RetryPolicy::fixed(5, Duration::from_millis(100))
        });

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_delay(), None);
    }
}
