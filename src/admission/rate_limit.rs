//! Fixed-window rate limiting per (class, client IP) key.
//!
//! The counter is a fixed window, not a rolling log: O(1) memory per key
//! and O(1) per check. The known imprecision is that a client can spend
//! a full budget at the end of one window and again right after the
//! boundary, up to 2x the ceiling in a short span. That behavior is an
//! accepted trade-off, kept deliberately rather than silently changed.
//!
//! Storage sits behind [`RateLimitStore`] so a shared external cache can
//! replace the in-process map without touching the gate algorithm.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use crate::admission::classifier::{Classification, RouteClass};
use crate::admission::client_ip::extract_client_ip;
use crate::admission::epoch_millis;
use crate::http::response::{header_num, AdmissionError};
use crate::observability::metrics;

/// Counted attempts for one key within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start_ms: u64,
    /// Touched on every attempt; lets the sweeper drop idle keys.
    pub last_attempt_ms: u64,
}

/// Keyed storage for window counters.
///
/// `incr` must be atomic per key: concurrent requests on the same key may
/// never observe a lost update.
pub trait RateLimitStore: Send + Sync {
    /// Count one attempt against `key`, creating the entry or resetting
    /// an elapsed window, and return the post-increment snapshot.
    fn incr(&self, key: &str, now_ms: u64, window_ms: u64) -> RateLimitEntry;

    fn remove(&self, key: &str);

    /// Drop entries whose window has fully elapsed. Returns how many
    /// were removed.
    fn prune(&self, now_ms: u64, window_ms: u64) -> usize;

    fn len(&self) -> usize;
}

/// Process-local store on a sharded concurrent map.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn incr(&self, key: &str, now_ms: u64, window_ms: u64) -> RateLimitEntry {
        // The entry guard holds the shard lock, making the
        // read-modify-write atomic for this key without a global lock.
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start_ms: now_ms,
                last_attempt_ms: now_ms,
            });

        if now_ms.saturating_sub(entry.window_start_ms) > window_ms {
            // Window boundary reset, not a rolling window.
            entry.count = 1;
            entry.window_start_ms = now_ms;
        } else {
            entry.count = entry.count.saturating_add(1);
        }
        entry.last_attempt_ms = now_ms;
        *entry
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn prune(&self, now_ms: u64, window_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.window_start_ms) <= window_ms);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Outcome of counting one request, with everything the response headers
/// need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub count: u32,
    pub remaining: u32,
    /// Epoch seconds when the current window closes.
    pub reset_epoch_secs: u64,
    /// Whole seconds until the window closes; meaningful on denial.
    pub retry_after_secs: u64,
}

/// The rate limiting gate.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window_ms: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, window_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            store,
            window_ms: window_secs * 1000,
        })
    }

    /// Count this attempt and decide. The key scopes class and IP so the
    /// same IP never shares budget across unrelated classes.
    pub fn check(
        &self,
        class: RouteClass,
        client_ip: &str,
        limit: u32,
        now_ms: u64,
    ) -> RateLimitDecision {
        let scope = class.scope().unwrap_or("general");
        let key = format!("{}:{}:{}", scope, class.key(), client_ip);
        let entry = self.store.incr(&key, now_ms, self.window_ms);

        let window_end_ms = entry.window_start_ms + self.window_ms;
        RateLimitDecision {
            allowed: entry.count <= limit,
            limit,
            count: entry.count,
            remaining: limit.saturating_sub(entry.count),
            reset_epoch_secs: window_end_ms.div_ceil(1000),
            retry_after_secs: window_end_ms.saturating_sub(now_ms).div_ceil(1000),
        }
    }

    /// Drop expired entries; called by the background sweeper.
    pub fn prune(&self, now_ms: u64) -> usize {
        self.store.prune(now_ms, self.window_ms)
    }
}

/// Middleware applying the ceiling carried by the request's
/// classification. Unlimited classes pass through untouched; limited
/// classes get the `X-RateLimit-*` headers on every response, allowed or
/// denied.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let classification = match request.extensions().get::<Classification>() {
        Some(c) => *c,
        None => return next.run(request).await,
    };
    let limit = match classification.limit {
        Some(limit) => limit,
        None => return next.run(request).await,
    };

    let client_ip = extract_client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );

    let decision = limiter.check(classification.class, &client_ip, limit, epoch_millis());

    if !decision.allowed {
        tracing::warn!(
            client_ip = %client_ip,
            class = %classification.class,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        metrics::record_denied("rate_limit");
        return AdmissionError::RateLimited {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_epoch_secs: decision.reset_epoch_secs,
            retry_after_secs: decision.retry_after_secs,
        }
        .into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", header_num(u64::from(decision.limit)));
    headers.insert(
        "X-RateLimit-Remaining",
        header_num(u64::from(decision.remaining)),
    );
    headers.insert("X-RateLimit-Reset", header_num(decision.reset_epoch_secs));
    response
}
