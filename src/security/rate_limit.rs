//! Per-client token bucket admission control.
//!
//! Every client (keyed by peer IP) owns a bucket holding up to `burst` tokens.
//! Buckets refill lazily from the elapsed time when the client is next seen;
//! there is no per-client timer. A background [`Sweeper`] drops buckets of
//! clients that went quiet.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::response;
use crate::observability::metrics;
use crate::security::sweeper::Sweeper;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny,
}

/// Rate limiting state for a single client.
#[derive(Debug, Clone)]
struct ClientBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl ClientBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// All client buckets behind one lock.
///
/// Admission and sweeping both take the whole map, so a sweep can never see a
/// bucket halfway through a refill.
#[derive(Debug, Default)]
pub(crate) struct ClientRegistry {
    clients: Mutex<HashMap<String, ClientBucket>>,
}

impl ClientRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientBucket>> {
        // A panic while holding the lock cannot leave a bucket outside its bounds.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove clients idle for strictly longer than `stale_after`.
    /// Returns the number of evicted clients.
    pub(crate) fn sweep(&self, now: Instant, stale_after: Duration) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= stale_after);
        let evicted = before - clients.len();
        metrics::record_rate_limit_clients(clients.len());
        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Per-client token bucket rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    registry: Arc<ClientRegistry>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ClientRegistry::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Decide whether a request from `client` may proceed.
    pub fn admit(&self, client: &str) -> Admission {
        self.admit_at(client, Instant::now())
    }

    /// [`admit`](Self::admit) against an explicit clock reading.
    pub fn admit_at(&self, client: &str, now: Instant) -> Admission {
        if !self.config.enabled {
            return Admission::Allow;
        }

        let capacity = f64::from(self.config.burst);
        let mut clients = self.registry.lock();
        let tracked = clients.len();
        let bucket = clients
            .entry(client.to_string())
            .or_insert_with(|| ClientBucket::new(capacity, now));
        let admitted = bucket.try_acquire(capacity, self.config.requests_per_second, now);

        if clients.len() != tracked {
            metrics::record_rate_limit_clients(clients.len());
        }

        if admitted {
            Admission::Allow
        } else {
            Admission::Deny
        }
    }

    /// Evict idle clients now. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        self.registry.sweep(now, self.config.stale_after())
    }

    /// Start the background sweeper for this limiter.
    ///
    /// Must be called from within a Tokio runtime. The sweeper runs until
    /// [`Sweeper::stop`] is called or the handle is dropped.
    pub fn spawn_sweeper(&self) -> Sweeper {
        Sweeper::spawn(
            Arc::clone(&self.registry),
            self.config.sweep_interval(),
            self.config.stale_after(),
        )
    }

    /// Tokens currently held by `client`, without refilling.
    pub fn tokens(&self, client: &str) -> Option<f64> {
        self.registry.lock().get(client).map(|bucket| bucket.tokens)
    }

    /// Number of clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }
}

/// Derive the client key from the transport peer address.
///
/// Headers such as `X-Forwarded-For` are ignored on purpose: a client could
/// otherwise pick a fresh key per request.
pub fn client_key(request: &Request<Body>) -> Option<String> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let Some(key) = client_key(&request) else {
        return response::server_error(&"peer address unavailable for rate limiting");
    };

    match limiter.admit(&key) {
        Admission::Allow => next.run(request).await,
        Admission::Deny => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
            response::rate_limit_exceeded()
        }
    }
}
