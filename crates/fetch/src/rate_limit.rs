use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Per-domain token bucket throttling speculative discovery/spec fetches.
/// Unrelated to the gateway's per-tenant/per-tool execution rate limits
/// — this exists so one noisy registration can't hammer a
/// target host while its candidates are probed.
pub struct DomainRateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    default_rate: f64,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
}

impl TokenBucket {
    fn new(rate: f64) -> Self {
        Self {
            tokens: rate,
            last_refill: Instant::now(),
            rate,
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.rate * 2.0);
        self.last_refill = Instant::now();
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

impl DomainRateLimiter {
    pub fn new(default_rate: f64) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            default_rate,
        }
    }

    pub async fn acquire(&self, domain: &str, timeout: Duration) -> Result<(), String> {
        let deadline = Instant::now() + timeout;

        loop {
            let wait_time = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(domain.to_string())
                    .or_insert_with(|| TokenBucket::new(self.default_rate));

                if bucket.try_acquire() {
                    return Ok(());
                }
                bucket.time_until_available()
            };

            if Instant::now() + wait_time > deadline {
                return Err(format!("rate limit timeout for domain: {domain}"));
            }
            tokio::time::sleep(wait_time).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_acquires_immediately() {
        let limiter = DomainRateLimiter::new(2.0);
        limiter
            .acquire("example.com", Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exhausted_bucket_waits_then_succeeds() {
        let limiter = DomainRateLimiter::new(100.0);
        for _ in 0..200 {
            let _ = limiter.acquire("example.com", Duration::from_millis(50)).await;
        }
    }
}
