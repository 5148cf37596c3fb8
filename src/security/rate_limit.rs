//! Sliding-window rate limiting.
//!
//! Counters live in a shared key-value store so every instance sees the same
//! budget. The estimate for the current moment blends the previous fixed
//! window with the current one:
//!
//! ```text
//! estimate = previous * (1 - elapsed / window) + current
//! ```
//!
//! Without a configured store the limiter permits everything and says so
//! once in the log.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::session::Identity;
use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("counter store transport error: {0}")]
    Transport(String),

    #[error("counter store returned an unexpected response: {0}")]
    Protocol(String),
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix milliseconds at which the current window ends.
    pub reset: u64,
}

/// Fixed-window counters backing the sliding estimate.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter of `window` for `key` and return
    /// `(current_window_count, previous_window_count)`.
    async fn hit(&self, key: &str, window: u64, window_ms: u64) -> Result<(u64, u64), RateLimitError>;
}

/// Entries kept before stale windows are swept.
const PURGE_THRESHOLD: usize = 10_000;

/// Process-local counters: `key -> (window, current, previous)`.
pub struct MemoryCounterStore {
    counters: DashMap<String, (u64, u64, u64)>,
    purge_threshold: usize,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::with_purge_threshold(PURGE_THRESHOLD)
    }
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purge_threshold(purge_threshold: usize) -> Self {
        Self { counters: DashMap::new(), purge_threshold }
    }

    /// Drop keys whose last hit is two or more windows before `window`; their
    /// counts no longer contribute to any estimate.
    pub fn purge(&self, window: u64) {
        self.counters.retain(|_, (stored, _, _)| *stored + 1 >= window);
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, window: u64, _window_ms: u64) -> Result<(u64, u64), RateLimitError> {
        if self.counters.len() > self.purge_threshold {
            self.purge(window);
        }

        let mut slot = self.counters.entry(key.to_string()).or_insert((window, 0, 0));
        let (stored, current, previous) = *slot;

        let next = if window <= stored {
            (stored, current + 1, previous)
        } else if stored + 1 == window {
            (window, 1, current)
        } else {
            (window, 1, 0)
        };

        *slot = next;
        Ok((next.1, next.2))
    }
}

/// Upstash Redis REST API (`/pipeline`).
pub struct UpstashCounterStore {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl UpstashCounterStore {
    pub fn new(url: &str, token: String, timeout: Duration) -> Result<Self, RateLimitError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RateLimitError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

fn count_result(entry: Option<&Value>) -> Result<u64, RateLimitError> {
    let entry = entry.ok_or_else(|| RateLimitError::Protocol("missing pipeline entry".into()))?;
    if let Some(err) = entry.get("error") {
        return Err(RateLimitError::Protocol(err.to_string()));
    }
    match entry.get("result") {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| RateLimitError::Protocol(n.to_string())),
        Some(Value::String(s)) => s.parse().map_err(|_| RateLimitError::Protocol(s.clone())),
        Some(other) => Err(RateLimitError::Protocol(other.to_string())),
    }
}

#[async_trait]
impl CounterStore for UpstashCounterStore {
    async fn hit(&self, key: &str, window: u64, window_ms: u64) -> Result<(u64, u64), RateLimitError> {
        let current_key = format!("{}:{}", key, window);
        let previous_key = format!("{}:{}", key, window.saturating_sub(1));
        let commands = json!([
            ["INCR", current_key],
            ["PEXPIRE", current_key, (window_ms * 2).to_string()],
            ["GET", previous_key],
        ]);

        let response = self
            .http
            .post(format!("{}/pipeline", self.url))
            .bearer_auth(&self.token)
            .json(&commands)
            .send()
            .await
            .map_err(|e| RateLimitError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RateLimitError::Protocol(format!("status {}", response.status())));
        }

        let results: Vec<Value> = response
            .json()
            .await
            .map_err(|e| RateLimitError::Protocol(e.to_string()))?;

        let current = count_result(results.first())?;
        let previous = if window == 0 { 0 } else { count_result(results.get(2))? };
        Ok((current, previous))
    }
}

/// Sliding-window limiter. Without a store, every check succeeds.
pub struct RateLimiter {
    store: Option<Arc<dyn CounterStore>>,
    limit: u32,
    window_ms: u64,
    warned: AtomicBool,
}

impl RateLimiter {
    pub fn new(store: Option<Arc<dyn CounterStore>>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window_ms: (window.as_millis() as u64).max(1),
            warned: AtomicBool::new(false),
        }
    }

    /// Build from configuration: Upstash when configured, process memory when
    /// opted in, otherwise the permissive fallback. A disabled limiter has no store.
    pub fn from_config(config: &RateLimitConfig, timeout: Duration) -> Result<Self, RateLimitError> {
        let window = Duration::from_secs(config.window_secs);
        if !config.enabled {
            return Ok(Self::new(None, config.requests, window).quiet());
        }

        let store: Option<Arc<dyn CounterStore>> = match (&config.upstash_url, &config.upstash_token) {
            (Some(url), Some(token)) => Some(Arc::new(UpstashCounterStore::new(url, token.clone(), timeout)?)),
            _ if config.in_memory => Some(Arc::new(MemoryCounterStore::new())),
            _ => None,
        };
        Ok(Self::new(store, config.requests, window))
    }

    /// Suppress the unconfigured-store warning (limiting deliberately disabled).
    fn quiet(self) -> Self {
        self.warned.store(true, Ordering::Relaxed);
        self
    }

    pub fn is_enforcing(&self) -> bool {
        self.store.is_some()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn permit(&self, window: u64) -> RateLimitDecision {
        RateLimitDecision {
            success: true,
            limit: self.limit,
            remaining: self.limit,
            reset: (window + 1) * self.window_ms,
        }
    }

    /// Check and count one request for `key` now.
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.check_at(key, now_ms).await
    }

    /// Check and count one request for `key` at `now_ms` (unix milliseconds).
    pub async fn check_at(&self, key: &str, now_ms: u64) -> RateLimitDecision {
        let window = now_ms / self.window_ms;

        let store = match &self.store {
            Some(store) => store,
            None => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!("Rate limit store not configured; all requests are permitted");
                }
                return self.permit(window);
            }
        };

        let (current, previous) = match store.hit(&format!("ratelimit:{}", key), window, self.window_ms).await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Rate limit store failed; permitting request");
                metrics::record_rate_limited("store_error");
                return self.permit(window);
            }
        };

        let elapsed = (now_ms % self.window_ms) as f64;
        let weight = 1.0 - elapsed / self.window_ms as f64;
        let estimate = previous as f64 * weight + current as f64;
        let limit = self.limit as f64;

        RateLimitDecision {
            success: estimate <= limit,
            limit: self.limit,
            remaining: (limit - estimate.ceil()).max(0.0) as u32,
            reset: (window + 1) * self.window_ms,
        }
    }
}

/// Shared, swappable limiter plus keying policy for the middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<ArcSwap<RateLimiter>>,
    pub trust_forwarded_for: Arc<AtomicBool>,
}

impl RateLimitState {
    pub fn new(limiter: RateLimiter, trust_forwarded_for: bool) -> Self {
        Self {
            limiter: Arc::new(ArcSwap::from_pointee(limiter)),
            trust_forwarded_for: Arc::new(AtomicBool::new(trust_forwarded_for)),
        }
    }

    /// Replace the limiter after a configuration reload.
    pub fn reload(&self, limiter: RateLimiter, trust_forwarded_for: bool) {
        self.limiter.store(Arc::new(limiter));
        self.trust_forwarded_for.store(trust_forwarded_for, Ordering::Relaxed);
    }
}

/// Key a request by identity, else by client address.
pub fn client_key(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    if let Some(identity) = request.extensions().get::<Identity>() {
        return format!("user:{}", identity.id);
    }

    if trust_forwarded_for {
        if let Some(ip) = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return format!("ip:{}", ip);
        }
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

fn set_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset));
}

/// Middleware enforcing the sliding-window budget.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request, state.trust_forwarded_for.load(Ordering::Relaxed));
    let limiter = state.limiter.load_full();
    let decision = limiter.check(&key).await;

    let mut response = if decision.success {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, limit = decision.limit, "Rate limit exceeded");
        metrics::record_rate_limited("window_budget");
        ApiError::RateLimited.into_response()
    };

    if limiter.is_enforcing() {
        set_headers(response.headers_mut(), &decision);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_limiter(limit: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(
            Some(Arc::new(MemoryCounterStore::new())),
            limit,
            Duration::from_millis(window_ms),
        )
    }

    #[tokio::test]
    async fn test_denies_after_budget_within_window() {
        let limiter = memory_limiter(3, 1000);

        for i in 0..3 {
            let d = limiter.check_at("user:a", 10_000 + i).await;
            assert!(d.success, "request {} should pass", i);
            assert_eq!(d.remaining, 2 - i as u32);
            assert_eq!(d.reset, 11_000);
        }

        for i in 0..5 {
            let d = limiter.check_at("user:a", 10_100 + i * 100).await;
            assert!(!d.success);
            assert_eq!(d.remaining, 0);
        }

        // Other keys keep their own budget
        assert!(limiter.check_at("user:b", 10_500).await.success);

        // Two windows later the history has expired
        assert!(limiter.check_at("user:a", 12_000).await.success);
    }

    #[tokio::test]
    async fn test_memory_store_forgets_expired_keys() {
        let store = MemoryCounterStore::with_purge_threshold(100);
        for i in 0..500 {
            store.hit(&format!("ip:10.0.{}.{}", i / 256, i % 256), 1, 1000).await.unwrap();
        }
        assert_eq!(store.len(), 500);

        store.hit("ip:recent", 9_999, 1000).await.unwrap();
        assert_eq!(store.len(), 1);

        // The previous window still feeds the estimate, so it survives a sweep
        store.purge(10_000);
        assert_eq!(store.hit("ip:recent", 10_000, 1000).await.unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn test_previous_window_is_weighted() {
        let limiter = memory_limiter(4, 1000);
        for _ in 0..4 {
            assert!(limiter.check_at("k", 1_000).await.success);
        }

        // Just after the boundary the previous window still counts almost fully
        let d = limiter.check_at("k", 2_010).await;
        assert!(!d.success);

        // Near the end of the next window only a sliver of it remains
        let d = limiter.check_at("k", 2_900).await;
        assert!(d.success, "estimate should be 4 * 0.1 + 2 = 2.4");
    }

    #[tokio::test]
    async fn test_unconfigured_store_always_permits() {
        let limiter = RateLimiter::new(None, 1, Duration::from_secs(60));
        assert!(!limiter.is_enforcing());
        for _ in 0..100 {
            let d = limiter.check("user:a").await;
            assert!(d.success);
            assert_eq!(d.remaining, 1);
        }
    }

    #[test]
    fn test_from_config_selects_store() {
        let mut config = RateLimitConfig::default();
        let t = Duration::from_secs(1);
        assert!(!RateLimiter::from_config(&config, t).unwrap().is_enforcing());

        config.in_memory = true;
        assert!(RateLimiter::from_config(&config, t).unwrap().is_enforcing());

        config.upstash_url = Some("https://example.upstash.io".into());
        config.upstash_token = Some("token".into());
        assert!(RateLimiter::from_config(&config, t).unwrap().is_enforcing());

        config.enabled = false;
        assert!(!RateLimiter::from_config(&config, t).unwrap().is_enforcing());
    }

    #[test]
    fn test_client_key() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request, true), "ip:203.0.113.7");
        assert_eq!(client_key(&request, false), "ip:unknown");

        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("198.51.100.2:5000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_key(&request, false), "ip:198.51.100.2");
    }

    #[test]
    fn test_count_result_parsing() {
        assert_eq!(count_result(Some(&json!({"result": 3}))).unwrap(), 3);
        assert_eq!(count_result(Some(&json!({"result": "7"}))).unwrap(), 7);
        assert_eq!(count_result(Some(&json!({"result": null}))).unwrap(), 0);
        assert!(count_result(Some(&json!({"error": "WRONGTYPE"}))).is_err());
        assert!(count_result(None).is_err());
    }
}
