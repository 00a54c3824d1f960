//! Rate-limited, retrying task execution.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rate::{LimitError, RateLimiter};

/// Retry behavior of remote calls.
///
/// Disabled by default: retrying is an explicit decision because the
/// wrapped operation must be idempotent for it to be safe. The executor
/// never establishes idempotency itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Whether finished calls are retried at all.
    pub enabled: bool,
    /// Maximum invocations of the task, including the first.
    pub max_attempts: u32,
    /// Base wait between attempts in milliseconds.
    pub interval_ms: u64,
    /// Double the wait per attempt (with jitter) instead of a fixed wait.
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 10,
            interval_ms: 500,
            exponential_backoff: false,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables retries.
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base interval.
    #[must_use]
    pub fn with_interval_ms(mut self, interval: u64) -> Self {
        self.interval_ms = interval;
        self
    }

    /// Switches to exponential backoff.
    #[must_use]
    pub fn with_exponential_backoff(mut self) -> Self {
        self.exponential_backoff = true;
        self
    }

    /// Wait before the attempt following `attempt` (1-indexed).
    ///
    /// Exponential backoff doubles the base per attempt, capped at one
    /// minute, with equal jitter so synchronized retries spread out.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff {
            return Duration::from_millis(self.interval_ms);
        }
        let exp = self
            .interval_ms
            .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)))
            .min(60_000);
        let half = exp / 2;
        let jittered = if half == 0 {
            exp
        } else {
            half + rand::thread_rng().gen_range(0..=half)
        };
        Duration::from_millis(jittered)
    }
}

/// Runs tasks under a shared rate-limit window with optional retries.
///
/// The combinator is plain control flow: acquire the permit cost, run the
/// task, and when the caller-supplied predicate marks the outcome as
/// retryable, back off and go again. Every attempt pays the normal permit
/// cost. Exhausting the attempt budget surfaces the last outcome untouched.
/// Dropping the returned future aborts both the permit wait and the
/// in-flight attempt.
#[derive(Debug, Clone)]
pub struct ThrottledExecutor {
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl ThrottledExecutor {
    /// Creates an executor over the given limiter and policy.
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self { limiter, retry }
    }

    /// The shared limiter.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Runs `operation` under `cost` permits per attempt.
    ///
    /// `is_retryable` inspects the finished outcome; a `true` verdict
    /// consumes one attempt and reruns the operation after the policy
    /// delay. Outcome values are returned as-is, the error variant covers
    /// only rate-limit acquisition failures.
    pub async fn submit<T, F, Fut, P>(
        &self,
        cost: u32,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, LimitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let mut attempt: u32 = 1;
        loop {
            self.limiter.acquire(cost).await?;
            let outcome = operation().await;

            if !self.retry.enabled || attempt >= self.retry.max_attempts || !is_retryable(&outcome)
            {
                return Ok(outcome);
            }

            let delay = self.retry.delay_after(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying task");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Runs `operation` for its side effects, discarding the outcome.
    pub async fn run_without_result<T, F, Fut, P>(
        &self,
        cost: u32,
        operation: F,
        is_retryable: P,
    ) -> Result<(), LimitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        self.submit(cost, operation, is_retryable).await.map(|_| ())
    }

    /// Empties the current rate-limit window.
    ///
    /// Called when an outcome shows the remote side throttled the call, so
    /// subsequent tasks wait for the next window instead of piling on.
    pub fn drain_window(&self) {
        self.limiter.drain();
    }
}
