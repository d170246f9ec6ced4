use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Per-tenant and per-tool token-bucket rate limiting. On exhaustion,
/// `acquire` queues briefly (bounded by `max_queue_ms`) rather than
/// failing immediately — callers that time out get `rate_limited_local`.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    max_queue: Duration,
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

pub enum AcquireResult {
    Acquired,
    Exhausted,
}

impl RateLimiter {
    pub fn new(max_queue: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_queue,
        }
    }

    /// Acquire a permit for `key` at `rate` tokens/sec, queueing briefly
    /// before reporting exhaustion (`rate_limited_local`).
    pub async fn acquire(&self, key: &str, rate: f64) -> AcquireResult {
        let deadline = Instant::now() + self.max_queue;

        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(key.to_string())
                    .or_insert_with(|| TokenBucket::new(rate));

                if bucket.try_acquire() {
                    return AcquireResult::Acquired;
                }
                bucket.time_until_available()
            };

            if Instant::now() + wait > deadline {
                return AcquireResult::Exhausted;
            }
            tokio::time::sleep(wait).await;
        }
    }
}

pub fn tenant_key(tenant_id: impl std::fmt::Display) -> String {
    format!("tenant:{tenant_id}")
}

pub fn tool_key(tool_id: impl std::fmt::Display) -> String {
    format!("tool:{tool_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_acquire_succeeds_immediately() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let result = limiter.acquire("tenant:a", 5.0).await;
        assert!(matches!(result, AcquireResult::Acquired));
    }

    #[tokio::test]
    async fn exhausted_bucket_reports_rate_limited_after_queue_timeout() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        for _ in 0..5 {
            let _ = limiter.acquire("tenant:a", 1.0).await;
        }
        let result = limiter.acquire("tenant:a", 1.0).await;
        assert!(matches!(result, AcquireResult::Exhausted));
    }
}
