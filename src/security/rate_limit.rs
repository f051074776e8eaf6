//! Global token-bucket admission control.
//!
//! One bucket guards the whole server. It starts full, refills lazily at
//! `rate` tokens per second and never holds more than `burst` tokens. Each
//! admitted request spends one token; a request arriving at an empty bucket is
//! answered with 429 before anything else runs.
//!
//! The budget is shared by every client, so one aggressive client can starve
//! the others.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::config::schema::BURST_FACTOR;
use crate::http::response::plain_error;

/// Token bucket state. Only ever touched under the limiter's lock.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        // Instants observed out of order by racing callers count as no time.
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        if now > self.last_update {
            self.last_update = now;
        }

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Process-wide rate limiter. Only [`RateLimiter::allow`] is exposed.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    rate: f64,
    burst: u32,
}

impl RateLimiter {
    /// A limiter sustaining `events_per_second` with a burst of four times
    /// that.
    pub fn new(events_per_second: u32) -> Self {
        Self::with_burst(
            f64::from(events_per_second),
            events_per_second.saturating_mul(BURST_FACTOR),
        )
    }

    /// A limiter refilling `rate` tokens per second up to `burst`, starting full.
    pub fn with_burst(rate: f64, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::full(f64::from(burst), rate, Instant::now())),
            rate,
            burst,
        }
    }

    /// Refill, then spend one token if one is available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(now)
    }

    /// Sustained refill rate, in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    #[cfg(test)]
    fn tokens(&self) -> f64 {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
    }
}

/// Middleware rejecting requests once the bucket is empty.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.allow() {
        next.run(request).await
    } else {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            rate = limiter.rate(),
            burst = limiter.burst(),
            "Rate limit exceeded"
        );
        plain_error(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests")
    }
}
