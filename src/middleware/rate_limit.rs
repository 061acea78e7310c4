use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::utils::error::AppError;

/// Key used when the connection address is unavailable (e.g. in-process
/// test clients).
const UNKNOWN_CLIENT: &str = "unknown";

/// Fixed-window request counter keyed by client IP. Over-limit requests are
/// rejected before the inner service runs, so a rate-limited scan never
/// reaches the adjudication engine and writes no ledger entry.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, (u64, u32)>>>,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request against `key`; false means the caller must be
    /// rejected.
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        self.try_acquire_at(key, now)
    }

    fn try_acquire_at(&self, key: &str, now_secs: u64) -> bool {
        let window_index = now_secs / self.window.as_secs().max(1);
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Counts from earlier windows can never be consulted again, so the
        // map is swept on every rollover; otherwise one request per spoofed
        // source address would grow it without bound.
        windows.retain(|_, counter| counter.0 == window_index);

        let entry = windows.entry(key.to_string()).or_insert((window_index, 0));
        entry.1 += 1;
        entry.1 <= self.max_per_window
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(max_per_window, window),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = RateLimitFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let key = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

        if self.limiter.try_acquire(&key) {
            RateLimitFuture::Inner {
                future: self.inner.call(request),
            }
        } else {
            tracing::warn!(client = %key, "Rejected scan request over rate limit");
            RateLimitFuture::Rejected {
                response: Some(AppError::RateLimited.into_response()),
            }
        }
    }
}

#[pin_project::pin_project(project = RateLimitFutureProj)]
pub enum RateLimitFuture<F> {
    Inner {
        #[pin]
        future: F,
    },
    Rejected {
        response: Option<Response>,
    },
}

impl<F, E> std::future::Future for RateLimitFuture<F>
where
    F: std::future::Future<Output = Result<Response, E>>,
{
    type Output = Result<Response, E>;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            RateLimitFutureProj::Inner { future } => future.poll(cx),
            RateLimitFutureProj::Rejected { response } => Poll::Ready(Ok(response
                .take()
                .expect("RateLimitFuture polled after completion"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_within_one_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire_at("1.2.3.4", 1000));
        assert!(limiter.try_acquire_at("1.2.3.4", 1001));
        assert!(limiter.try_acquire_at("1.2.3.4", 1002));
        assert!(!limiter.try_acquire_at("1.2.3.4", 1003));
    }

    #[test]
    fn window_rollover_resets_the_count() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire_at("ip", 0));
        assert!(!limiter.try_acquire_at("ip", 59));
        assert!(limiter.try_acquire_at("ip", 60));
    }

    #[test]
    fn clients_are_counted_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire_at("a", 10));
        assert!(limiter.try_acquire_at("b", 10));
        assert!(!limiter.try_acquire_at("a", 11));
    }

    #[test]
    fn stale_clients_are_swept_on_rollover() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        for i in 0..50 {
            assert!(limiter.try_acquire_at(&format!("10.0.0.{}", i), 10));
        }
        assert_eq!(limiter.tracked_clients(), 50);

        assert!(limiter.try_acquire_at("10.0.0.1", 70));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
