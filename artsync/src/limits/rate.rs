//! Token-bucket rate limiter with suspending acquisition.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Configuration of one rate-limit window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Permits available per refresh period.
    pub permits_per_period: u32,
    /// Length of the refresh period in milliseconds.
    pub period_ms: u64,
    /// How long an acquisition may wait before failing, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            permits_per_period: 100,
            period_ms: 1_000,
            acquire_timeout_ms: 10_000,
        }
    }
}

impl RateLimitConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the permits per period.
    #[must_use]
    pub fn with_permits_per_period(mut self, permits: u32) -> Self {
        self.permits_per_period = permits;
        self
    }

    /// Sets the refresh period.
    #[must_use]
    pub fn with_period_ms(mut self, period: u64) -> Self {
        self.period_ms = period;
        self
    }

    /// Sets the acquisition timeout.
    #[must_use]
    pub fn with_acquire_timeout_ms(mut self, timeout: u64) -> Self {
        self.acquire_timeout_ms = timeout;
        self
    }

    /// Refresh period as a duration.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Acquisition timeout as a duration.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Failure to run a task under the rate limit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitError {
    /// No permits became available within the acquisition timeout.
    #[error("rate-limit permit not acquired within timeout")]
    AcquireTimeout,

    /// The requested cost can never be satisfied by one window.
    #[error("task cost {cost} exceeds window size {limit}")]
    CostExceedsWindow {
        /// Requested cost.
        cost: u32,
        /// Permits per period.
        limit: u32,
    },
}

#[derive(Debug)]
struct Window {
    available: u32,
    period_start: Instant,
}

/// Token bucket over a fixed refresh period.
///
/// `acquire` suspends the calling task, it never parks a worker thread.
/// Dropping the future returned by `acquire` abandons the wait without
/// consuming permits.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Creates a limiter with a full first window.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let window = Mutex::new(Window {
            available: config.permits_per_period,
            period_start: Instant::now(),
        });
        Self { config, window }
    }

    /// Acquires `cost` permits, waiting across window refreshes up to the
    /// configured acquisition timeout.
    pub async fn acquire(&self, cost: u32) -> Result<(), LimitError> {
        if cost > self.config.permits_per_period {
            return Err(LimitError::CostExceedsWindow {
                cost,
                limit: self.config.permits_per_period,
            });
        }

        let deadline = Instant::now() + self.config.acquire_timeout();
        loop {
            let next_refresh = {
                let mut window = self.window.lock();
                self.refresh(&mut window);
                if window.available >= cost {
                    window.available -= cost;
                    return Ok(());
                }
                window.period_start + self.config.period()
            };

            if next_refresh > deadline {
                return Err(LimitError::AcquireTimeout);
            }
            tokio::time::sleep_until(next_refresh).await;
        }
    }

    /// Empties the current window.
    ///
    /// Used when a call result reveals the remote side throttled us even
    /// though local permits were available.
    pub fn drain(&self) {
        self.window.lock().available = 0;
    }

    /// Permits left in the current window.
    #[must_use]
    pub fn available_permits(&self) -> u32 {
        let mut window = self.window.lock();
        self.refresh(&mut window);
        window.available
    }

    fn refresh(&self, window: &mut Window) {
        let now = Instant::now();
        let period = self.config.period();
        if now < window.period_start + period {
            return;
        }
        let elapsed = now.duration_since(window.period_start);
        let periods = (elapsed.as_nanos() / period.as_nanos().max(1)) as u32;
        window.period_start += period * periods;
        window.available = self.config.permits_per_period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(permits: u32, period_ms: u64, timeout_ms: u64) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig::new()
                .with_permits_per_period(permits)
                .with_period_ms(period_ms)
                .with_acquire_timeout_ms(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_acquire_within_window() {
        let limiter = limiter(2, 1_000, 1_000);
        limiter.acquire(1).await.expect("first permit");
        limiter.acquire(1).await.expect("second permit");
        assert_eq!(limiter.available_permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refresh() {
        let limiter = limiter(1, 1_000, 5_000);
        limiter.acquire(1).await.expect("first permit");

        let started = Instant::now();
        limiter.acquire(1).await.expect("permit after refresh");
        assert!(started.elapsed() >= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let limiter = limiter(1, 10_000, 100);
        limiter.acquire(1).await.expect("first permit");

        let err = limiter.acquire(1).await.expect_err("no permit in time");
        assert_eq!(err, LimitError::AcquireTimeout);
    }

    #[tokio::test]
    async fn test_cost_exceeding_window_fails_fast() {
        let limiter = limiter(4, 1_000, 1_000);
        let err = limiter.acquire(5).await.expect_err("cost too large");
        assert_eq!(
            err,
            LimitError::CostExceedsWindow { cost: 5, limit: 4 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_empties_window() {
        let limiter = limiter(10, 1_000, 100);
        limiter.drain();
        assert_eq!(limiter.available_permits(), 0);
        let err = limiter.acquire(1).await.expect_err("drained");
        assert_eq!(err, LimitError::AcquireTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_refreshes_after_drain() {
        let limiter = limiter(10, 1_000, 100);
        limiter.drain();
        tokio::time::sleep(Duration::from_millis(1_001)).await;
        assert_eq!(limiter.available_permits(), 10);
    }
}
