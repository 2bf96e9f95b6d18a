use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub requests_per_min: Option<u64>,
    pub concurrency: Option<u32>,
}

/// Token bucket over requests per minute, with an optional concurrency cap.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // tokens available and the time of the last refill
    rpm_tokens: Mutex<(f64, Instant)>,
    sem: Option<Semaphore>,
}

/// Held for the duration of a request when a concurrency cap is configured.
pub struct Permit<'a> {
    _permit: Option<SemaphorePermit<'a>>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let rpm_capacity = limits.requests_per_min.unwrap_or(0) as f64;
        let sem = limits.concurrency.map(|c| Semaphore::new(c.max(1) as usize));
        Self {
            inner: Arc::new(Inner {
                limits,
                rpm_tokens: Mutex::new((rpm_capacity, Instant::now())),
                sem,
            }),
        }
    }

    /// Waits until a request may be sent.
    pub async fn acquire(&self) -> Permit<'_> {
        // Concurrency first; a closed semaphore just means no cap
        let permit = match &self.inner.sem {
            Some(sem) => sem.acquire().await.ok(),
            None => None,
        };

        if let Some(rpm) = self.inner.limits.requests_per_min.filter(|rpm| *rpm > 0) {
            self.consume_token(rpm as f64, 60.0).await;
        }

        Permit { _permit: permit }
    }

    async fn consume_token(&self, capacity: f64, period_secs: f64) {
        // Basic token bucket: refill continuously, wait until a token accumulates
        loop {
            let mut guard = self.inner.rpm_tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            let refill_rate = capacity / period_secs;
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_minute(requests_per_min: u64) -> RateLimiter {
        RateLimiter::new(Limits {
            requests_per_min: Some(requests_per_min),
            concurrency: None,
        })
    }

    #[tokio::test]
    async fn unlimited_never_waits() {
        let limiter = RateLimiter::new(Limits::default());
        let started = Instant::now();
        for _ in 0..100 {
            let _permit = limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn burst_up_to_capacity_is_immediate() {
        let limiter = per_minute(600);
        let started = Instant::now();
        for _ in 0..10 {
            let _permit = limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn waits_once_bucket_is_empty() {
        // 120/min refills two tokens per second
        let limiter = per_minute(120);
        for _ in 0..120 {
            let _permit = limiter.acquire().await;
        }
        let started = Instant::now();
        let _permit = limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn concurrency_cap_holds_permits() {
        let limiter = RateLimiter::new(Limits {
            requests_per_min: None,
            concurrency: Some(1),
        });
        let first = limiter.acquire().await;
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(blocked.is_err());
        drop(first);
        let _second = limiter.acquire().await;
    }
}
