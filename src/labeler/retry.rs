// Bounded retry with exponential backoff for rate-limited label calls.
//
// A call moves through ATTEMPT → SUCCESS, ATTEMPT → RATE_LIMITED → WAIT →
// ATTEMPT, or ATTEMPT → OTHER_FAILURE. Only rate limits are retried, the
// wait doubles each time, and there is no wait after the final attempt.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use super::traits::GenerationError;

/// Default attempts per label call, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default wait after the first rate-limited attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Outcome of a label call that didn't produce a label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("rate limited on all {attempts} attempts (last: {last})")]
    RateLimited { attempts: u32, last: String },
    #[error("generative service error: {0}")]
    Service(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th rate-limited attempt (1-based):
    /// base, 2·base, 4·base, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Sum of every wait a fully rate-limited call sits through.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|a| self.delay_after(a))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Run `operation` until it succeeds, fails with a non-rate-limit error, or
/// has been rate limited `max_attempts` times.
pub async fn with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, LabelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(GenerationError::Failed(message)) => return Err(LabelError::Service(message)),
            Err(GenerationError::RateLimited(message)) => {
                if attempt >= max_attempts {
                    return Err(LabelError::RateLimited {
                        attempts: attempt,
                        last: message,
                    });
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    backoff_secs = delay.as_secs_f64(),
                    "Rate limited, retrying in {:.1}s (attempt {}/{})",
                    delay.as_secs_f64(),
                    attempt,
                    max_attempts,
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
