//! Bounded retry with exponential backoff and call pacing.
//!
//! Every call to the wrapped transform first passes the [`RateLimiter`], which
//! delays (never rejects) calls so that no two start closer together than
//! `60 / requests_per_minute` seconds. Transient failures and attempts that
//! exceed the per-attempt timeout are retried after
//! `base_delay * multiplier^(attempt - 1)`; permanent failures are returned at once.

use crate::defaults;
use crate::error::{DubshError, Result, TransformError};
use crate::pipeline::clock::Clock;
use crate::pipeline::segment::{Artifact, Segment};
use crate::pipeline::transform::Transform;
use std::time::{Duration, Instant};

/// Retry budget and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(defaults::BASE_DELAY_MS),
            multiplier: defaults::BACKOFF_MULTIPLIER,
            attempt_timeout: Duration::from_millis(defaults::ATTEMPT_TIMEOUT_MS),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DubshError::ConfigInvalidValue {
                key: "retry.max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(DubshError::ConfigInvalidValue {
                key: "retry.multiplier".to_string(),
                message: format!("{} must be a finite number >= 1.0", self.multiplier),
            });
        }
        if self.attempt_timeout.is_zero() {
            return Err(DubshError::ConfigInvalidValue {
                key: "retry.attempt_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Progress of one segment through its attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<TransformError>,
}

/// Minimum-interval pacing limiter.
pub struct RateLimiter<C: Clock> {
    min_interval: Duration,
    last_start: Option<Instant>,
    clock: C,
}

impl<C: Clock> RateLimiter<C> {
    /// `requests_per_minute == 0` disables pacing.
    pub fn per_minute(requests_per_minute: u32, clock: C) -> Self {
        let min_interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / requests_per_minute
        };
        Self {
            min_interval,
            last_start: None,
            clock,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next call may start and marks it as started.
    ///
    /// Returns the time spent waiting.
    pub async fn acquire(&mut self) -> Duration {
        let mut waited = Duration::ZERO;
        if let Some(last) = self.last_start {
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                log::debug!("Pacing: waiting {:?} before next call", waited);
                self.clock.sleep(waited).await;
            }
        }
        self.last_start = Some(self.clock.now());
        waited
    }
}

/// Wraps a transform with pacing, per-attempt timeout and bounded retry.
pub struct RetryingTransform<T: Transform, C: Clock + Clone> {
    inner: T,
    policy: RetryPolicy,
    limiter: RateLimiter<C>,
    clock: C,
}

impl<T: Transform, C: Clock + Clone> RetryingTransform<T, C> {
    pub fn new(inner: T, policy: RetryPolicy, requests_per_minute: u32, clock: C) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            inner,
            policy,
            limiter: RateLimiter::per_minute(requests_per_minute, clock.clone()),
            clock,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Applies the transform, retrying transient failures.
    ///
    /// Exhausted retries come back as [`TransformError::Permanent`].
    pub async fn apply(&mut self, segment: &Segment) -> std::result::Result<Artifact, TransformError> {
        let id = segment.id();
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;
            self.limiter.acquire().await;

            let outcome = match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.inner.apply(segment),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TransformError::timed_out(self.policy.attempt_timeout)),
            };

            match outcome {
                Ok(artifact) => return Ok(artifact),
                Err(TransformError::Permanent(message)) => {
                    return Err(TransformError::Permanent(message));
                }
                Err(error) => {
                    let error = state.last_error.insert(error);
                    if state.attempt >= self.policy.max_attempts {
                        return Err(TransformError::Permanent(format!(
                            "gave up after {} attempt(s): {}",
                            state.attempt, error
                        )));
                    }
                    let delay = self.policy.delay_for(state.attempt);
                    log::warn!(
                        "[{}] segment {} attempt {}/{} failed: {}; retrying in {:?}",
                        self.inner.name(),
                        id,
                        state.attempt,
                        self.policy.max_attempts,
                        error,
                        delay
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::clock::ManualClock;
    use crate::pipeline::transform::{ScriptedTransform, Step};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(2),
            multiplier: 3.0,
            attempt_timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn test_backoff_curve() {
        let p = policy(5);
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(6));
        assert_eq!(p.delay_for(3), Duration::from_secs(18));
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        let p = RetryPolicy {
            multiplier: 1.5,
            ..RetryPolicy::default()
        };
        let delays: Vec<Duration> = (1..=10).map(|a| p.delay_for(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        for (i, delay) in delays.iter().enumerate() {
            let expected = p.base_delay.as_secs_f64() * 1.5f64.powi(i as i32);
            assert!((delay.as_secs_f64() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let p = RetryPolicy {
            multiplier: 10.0,
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_for(400), Duration::MAX);
    }

    #[test]
    fn test_policy_validation() {
        assert!(policy(0).validate().is_err());
        let bad_multiplier = RetryPolicy {
            multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert!(bad_multiplier.validate().is_err());
        assert!(RetryPolicy::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_paces_calls() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::per_minute(30, clock.clone());
        assert_eq!(limiter.min_interval(), Duration::from_secs(2));

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        clock.advance(Duration::from_millis(500));
        assert_eq!(limiter.acquire().await, Duration::from_millis(1500));
        clock.advance(Duration::from_secs(5));
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_rate_limiter_disabled() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::per_minute(0, clock.clone());
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let clock = ManualClock::new();
        let mut retrying =
            RetryingTransform::new(ScriptedTransform::echo(), policy(3), 0, clock.clone()).unwrap();
        let artifact = retrying.apply(&Segment::text(1, "hi")).await.unwrap();
        assert_eq!(artifact, Artifact::Text("hi".to_string()));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let clock = ManualClock::new();
        let transform = ScriptedTransform::echo()
            .then_fail(TransformError::transient("timeout"))
            .then_fail(TransformError::transient("429"));
        let counter = transform.call_counter();
        let mut retrying = RetryingTransform::new(transform, policy(3), 0, clock.clone()).unwrap();

        let artifact = retrying.apply(&Segment::text(1, "hi")).await.unwrap();

        assert_eq!(artifact, Artifact::Text("hi".to_string()));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(2), Duration::from_secs(6)]
        );
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_budget() {
        let clock = ManualClock::new();
        let transform = ScriptedTransform::echo()
            .then_fail(TransformError::transient("a"))
            .then_fail(TransformError::transient("b"))
            .then_fail(TransformError::transient("c"));
        let counter = transform.call_counter();
        let mut retrying = RetryingTransform::new(transform, policy(3), 0, clock.clone()).unwrap();

        let error = retrying.apply(&Segment::text(1, "hi")).await.unwrap_err();

        assert!(!error.is_transient());
        assert_eq!(
            error,
            TransformError::permanent("gave up after 3 attempt(s): transient: c")
        );
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let clock = ManualClock::new();
        let transform =
            ScriptedTransform::echo().then_fail(TransformError::permanent("missing label"));
        let counter = transform.call_counter();
        let mut retrying = RetryingTransform::new(transform, policy(3), 0, clock.clone()).unwrap();

        let error = retrying.apply(&Segment::text(1, "hi")).await.unwrap_err();

        assert_eq!(error, TransformError::permanent("missing label"));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_hang_counts_as_transient() {
        let clock = ManualClock::new();
        let transform = ScriptedTransform::echo().then(Step::Hang(Duration::from_secs(30)));
        let counter = transform.call_counter();
        let mut retrying = RetryingTransform::new(
            transform,
            RetryPolicy {
                attempt_timeout: Duration::from_millis(20),
                ..policy(2)
            },
            0,
            clock.clone(),
        )
        .unwrap();

        let artifact = retrying.apply(&Segment::text(1, "late")).await.unwrap();

        assert_eq!(artifact, Artifact::Text("late".to_string()));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_pacing_applies_between_segments() {
        let clock = ManualClock::new();
        let mut retrying =
            RetryingTransform::new(ScriptedTransform::echo(), policy(3), 60, clock.clone()).unwrap();

        retrying.apply(&Segment::text(1, "a")).await.unwrap();
        retrying.apply(&Segment::text(2, "b")).await.unwrap();

        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }
}
