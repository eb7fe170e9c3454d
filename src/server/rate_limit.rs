//! Per-IP rate limiting for the proxy endpoints.
//!
//! Fixed-window counters in a DashMap. Segment fetches arrive in bursts from
//! legitimate players, so the limit is per minute rather than per second.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::state::AppState;

#[derive(Clone, Debug)]
struct Window {
    hits: u32,
    started: Instant,
}

/// Fixed-window per-client request limiter.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit,
            window,
        }
    }

    /// Record a hit from `client` and report whether it is still under limit.
    fn allow(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(client.to_string()).or_insert(Window {
            hits: 0,
            started: now,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.hits = 0;
            entry.started = now;
        }

        entry.hits += 1;
        entry.hits <= self.limit
    }

    /// Drop counters whose window has passed; called by the janitor.
    pub fn purge_expired(&self) {
        self.windows
            .retain(|_, w| w.started.elapsed() < self.window);
    }
}

/// Client identity: first hop of X-Forwarded-For, or a shared bucket when the
/// proxy is reached directly (local dev).
fn client_key(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("direct")
        .to_string()
}

/// Axum middleware: 429 for clients over their per-minute budget.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(ref limiter) = state.rate_limiter {
        let client = client_key(&req);
        if !limiter.allow(&client) {
            warn!("Rate limit exceeded for client: {}", client);
            return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded\n").into_response();
        }
    }

    next.run(req).await
}
