use harvest_core::{CoreError, ErrorExt, RedditApiError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How often and how patiently a single Reddit call is retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total tries, the first one included. Zero behaves like one.
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random extra wait, as a share of the computed delay.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Settings used against the live API.
    pub fn reddit() -> Self {
        Self {
            attempts: 4,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: 0.2,
        }
    }

    /// Doubling backoff for the given retry number (0 = first retry), jittered
    /// and capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self
            .initial_delay
            .checked_mul(1u32.checked_shl(retry).unwrap_or(u32::MAX))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        let extra = base.mul_f64(self.jitter.clamp(0.0, 1.0) * fastrand::f64());
        (base + extra).min(self.max_delay)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Try again after the configured backoff.
    Backoff,
    /// Try again after exactly this long, as the server asked.
    Wait(Duration),
    GiveUp,
}

impl RetryDecision {
    pub fn for_error(error: &CoreError) -> Self {
        match error {
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after }) => {
                RetryDecision::Wait(Duration::from_secs(*retry_after))
            }
            // The caller drops the cached token first, so the next attempt re-authenticates.
            CoreError::RedditApi(RedditApiError::InvalidToken) => RetryDecision::Backoff,
            e if e.is_retryable() => RetryDecision::Backoff,
            _ => RetryDecision::GiveUp,
        }
    }
}

/// Reruns a fallible async call according to a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the first success, or the last error once the call fails
    /// permanently or the attempts run out.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let attempts = self.config.attempts.max(1);
        let mut attempt = 0;
        let mut waited = Duration::ZERO;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {} after waiting {:?}", label, attempt, waited);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match RetryDecision::for_error(&error) {
                RetryDecision::GiveUp => {
                    debug!("{} failed permanently: {}", label, error);
                    return Err(error);
                }
                _ if attempt == attempts => {
                    warn!("{} gave up after {} attempts: {}", label, attempts, error);
                    return Err(error);
                }
                RetryDecision::Wait(delay) => delay,
                RetryDecision::Backoff => self.config.backoff(attempt - 1),
            };

            info!(
                "{} failed (attempt {}/{}), retrying in {:?}: {}",
                label, attempt, attempts, delay, error
            );
            waited += delay;
            sleep(delay).await;
        }
    }
}
