//! Token bucket rate limiter for outbound data requests.
//!
//! The broker feed tolerates roughly three requests per second; every call
//! made through [`super::ResilientSource`] takes one token first.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket holding up to `capacity` tokens, refilled continuously at
/// `rate_per_sec`.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    capacity: f64,
    rate_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` sustained, with a burst
    /// of the same size. Zero is treated as one.
    pub fn from_rps(name: impl Into<String>, requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1) as f64;
        Self {
            name: name.into(),
            capacity: rps,
            rate_per_sec: rps,
            bucket: Mutex::new(Bucket {
                tokens: rps,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.capacity);
            bucket.last_refill = now;
        }
    }

    /// Acquire a token, waiting until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate_per_sec)
            };

            let wait = wait.clamp(Duration::from_millis(5), Duration::from_secs(1));
            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, waiting for token"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Shared rate limiter handle.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared rate limiter.
pub fn shared_limiter(name: impl Into<String>, requests_per_second: u32) -> SharedRateLimiter {
    Arc::new(RateLimiter::from_rps(name, requests_per_second))
}
