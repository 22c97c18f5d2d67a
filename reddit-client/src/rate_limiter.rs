use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use tracing::debug;

/// Request budget of one OAuth credential.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    /// Requests that may go out back to back before pacing kicks in.
    pub burst: u32,
    /// Requests allowed on the wire at the same time.
    pub max_in_flight: u32,
}

impl RateLimitConfig {
    /// Reddit grants OAuth clients 100 requests per minute.
    pub fn reddit() -> Self {
        Self {
            requests_per_minute: 100,
            burst: 10,
            max_in_flight: 10,
        }
    }

    fn tokens_per_second(&self) -> f64 {
        f64::from(self.requests_per_minute.max(1)) / 60.0
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn top_up(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let earned = now.duration_since(self.refilled_at).as_secs_f64() * rate;
        self.tokens = (self.tokens + earned).min(capacity);
        self.refilled_at = now;
    }
}

/// Paces requests with a token bucket and caps how many run at once.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    in_flight: Arc<Semaphore>,
    capacity: f64,
    rate: f64,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = f64::from(config.burst.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
            in_flight: Arc::new(Semaphore::new(config.max_in_flight.max(1) as usize)),
            capacity,
            rate: config.tokens_per_second(),
            config,
        }
    }

    /// Spends a token if one is left; otherwise says how long until one is.
    async fn take_token(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().await;
        bucket.top_up(self.rate, self.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate))
        }
    }

    /// Waits until a request may be sent. Keep the permit alive until the
    /// response has been read.
    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let queued_at = Instant::now();
        // The semaphore is never closed, so this only fails in theory.
        let slot = self.in_flight.clone().acquire_owned().await.ok();

        while let Err(wait) = self.take_token().await {
            debug!("Request budget spent, pausing {:?}", wait);
            sleep(wait).await;
        }

        RateLimitPermit {
            _slot: slot,
            queue_wait_time: queued_at.elapsed(),
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut bucket = self.bucket.lock().await;
        bucket.top_up(self.rate, self.capacity);
        RateLimitStatus {
            available_tokens: bucket.tokens.floor() as u32,
            max_tokens: self.capacity as u32,
            available_permits: self.in_flight.available_permits() as u32,
            requests_per_minute: self.config.requests_per_minute,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _slot: Option<OwnedSemaphorePermit>,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub available_permits: u32,
    pub requests_per_minute: u32,
}
