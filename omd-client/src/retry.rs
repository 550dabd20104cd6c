use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ApiResult};

/// Source of the random part of a backoff delay.
pub trait Jitter: Send + Sync {
    fn jitter(&self, attempt: u32) -> Duration;
}

/// Uniform jitter in `[0, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomJitter {
    pub max: Duration,
}

impl Jitter for RandomJitter {
    fn jitter(&self, _attempt: u32) -> Duration {
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

/// Always the same jitter; keeps tests deterministic.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

impl Jitter for FixedJitter {
    fn jitter(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Backoff for rate-limited backend calls.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total tries, including the first one
    pub attempts: u32,
    pub base: Duration,
    pub jitter: Arc<dyn Jitter>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base: Duration::from_millis(250),
            jitter: Arc::new(RandomJitter {
                max: Duration::from_millis(120),
            }),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base: Duration, jitter: Arc<dyn Jitter>) -> Self {
        Self {
            attempts,
            base,
            jitter,
        }
    }

    /// `base * 2^attempt + jitter`, attempt counted from zero
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.base.saturating_mul(factor) + self.jitter.jitter(attempt)
    }
}

/// Run `op`, retrying only rate-limit failures with exponential backoff.
///
/// Any other error is returned on the first failure. Cancelling `cancel`
/// aborts the in-flight attempt or the pending sleep with
/// [`ApiError::Cancelled`].
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let tries = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            result = op() => result,
        };

        match result {
            Err(e) if e.is_rate_limited() && attempt + 1 < tries => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    "rate limited (attempt {}/{}), retrying in {:?}",
                    attempt + 1,
                    tries,
                    delay
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            other => return other,
        }
    }
}
