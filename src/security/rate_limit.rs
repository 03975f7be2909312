//! Per-client token-bucket rate limiting.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::schema::RateLimitConfig;
use crate::observability::metrics;

/// How often idle buckets are swept.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// A bucket untouched this long is dropped. It would have refilled long ago,
/// so a returning client sees the same full burst.
pub const MAX_IDLE: Duration = Duration::from_secs(300);

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Buckets keyed by client IP. Requests without a peer address share one
/// bucket.
pub struct RateLimiter {
    buckets: DashMap<Option<IpAddr>, TokenBucket>,
    rps: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            rps: f64::from(config.requests_per_second),
            burst: f64::from(config.burst_size.max(1)),
        }
    }

    /// Take one token for `client`; false when the bucket is empty.
    pub fn check(&self, client: Option<IpAddr>) -> bool {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::full(self.burst));
        bucket.try_acquire(self.burst, self.rps, now)
    }

    pub fn client_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets not used within `max_idle`. Returns how many went.
    pub fn cleanup(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < max_idle);
        before.saturating_sub(self.buckets.len())
    }

    /// Sweep idle buckets every `interval` until `shutdown` fires.
    pub async fn run_cleanup(
        self: Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.cleanup(max_idle);
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.client_count(), "Rate limiter cleanup");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if limiter.check(client) {
        next.run(request).await
    } else {
        tracing::warn!(client = ?client, "Rate limit exceeded");
        metrics::record_rate_limited();
        (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(rps: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst_size: burst,
        })
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = limiter(1, 3);
        let client = Some(IpAddr::from([127, 0, 0, 1]));
        assert!(limiter.check(client));
        assert!(limiter.check(client));
        assert!(limiter.check(client));
        assert!(!limiter.check(client));
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let limiter = limiter(1, 1);
        assert!(limiter.check(Some(IpAddr::from([10, 0, 0, 1]))));
        assert!(!limiter.check(Some(IpAddr::from([10, 0, 0, 1]))));
        assert!(limiter.check(Some(IpAddr::from([10, 0, 0, 2]))));
    }

    #[test]
    fn test_cleanup_removes_stale() {
        let limiter = limiter(10, 10);
        for i in 0..5u8 {
            limiter.check(Some(IpAddr::from([10, 0, 0, i])));
        }
        assert_eq!(limiter.client_count(), 5);

        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(limiter.cleanup(Duration::from_millis(1)), 5);
        assert_eq!(limiter.client_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_recent() {
        let limiter = limiter(10, 10);
        limiter.check(Some(IpAddr::from([10, 0, 0, 1])));
        assert_eq!(limiter.cleanup(Duration::from_secs(60)), 0);
        assert_eq!(limiter.client_count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_task_sweeps_and_stops() {
        let limiter = Arc::new(limiter(10, 10));
        limiter.check(Some(IpAddr::from([10, 0, 0, 1])));
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(limiter.clone().run_cleanup(
            Duration::from_millis(20),
            Duration::from_millis(1),
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(limiter.client_count(), 0);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_refill() {
        let mut bucket = TokenBucket::full(1.0);
        let start = bucket.last_update;
        assert!(bucket.try_acquire(1.0, 10.0, start));
        assert!(!bucket.try_acquire(1.0, 10.0, start));
        assert!(bucket.try_acquire(1.0, 10.0, start + Duration::from_millis(150)));
    }
}
