//! Per-IP rate limiting for the HTTP surface (WebSocket upgrades included).
//!
//! Token-bucket per client address: requests drain tokens, time refills
//! them up to the burst capacity. Buckets for idle addresses are purged by
//! a background task so the map cannot grow without bound.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    /// Sustained requests per second.
    rate: f64,
    /// Burst capacity.
    capacity: f64,
}

impl RateLimiter {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity,
        }
    }

    /// Take one token for this address; `false` means the request must be
    /// rejected.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        let bucket = buckets.entry(ip).or_insert(Bucket {
            tokens: self.capacity,
            last_seen: now,
        });

        let elapsed = now.duration_since(bucket.last_seen).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle longer than `max_idle`.
    pub async fn purge_stale(&self, max_idle: Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) < max_idle);
    }

    #[cfg(test)]
    async fn tracked_addresses(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

impl Default for RateLimiter {
    /// 5 req/s sustained with a burst of 20.
    fn default() -> Self {
        Self::new(5.0, 20.0)
    }
}

pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ip) = client_ip(&req) {
        if !limiter.allow(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Prefer the socket address; honour X-Forwarded-For when running behind a
/// reverse proxy.
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|connect_info| connect_info.0.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_drains_then_blocks() {
        let limiter = RateLimiter::new(1.0, 3.0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.allow(ip).await);
        }
        assert!(!limiter.allow(ip).await);
    }

    #[tokio::test]
    async fn addresses_are_isolated() {
        let limiter = RateLimiter::new(1.0, 1.0);
        let first: IpAddr = "10.0.0.1".parse().unwrap();
        let second: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.allow(first).await);
        assert!(!limiter.allow(first).await);
        assert!(limiter.allow(second).await);
    }

    #[tokio::test]
    async fn purge_drops_idle_buckets() {
        let limiter = RateLimiter::default();
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.allow(ip).await);
        assert_eq!(limiter.tracked_addresses().await, 1);

        limiter.purge_stale(Duration::ZERO).await;
        assert_eq!(limiter.tracked_addresses().await, 0);
    }
}
