//! Rate limiting and retry for remote calls.
//!
//! Every remote call of the pipeline goes through a [`ThrottledExecutor`]:
//! a token-bucket [`RateLimiter`] grants a per-call permit budget, and a
//! caller-supplied predicate decides whether a finished call is retried
//! under the configured [`RetryPolicy`].

mod executor;
mod rate;

pub use executor::{RetryPolicy, ThrottledExecutor};
pub use rate::{LimitError, RateLimitConfig, RateLimiter};
