use crate::{cache::PlaylistCache, config::Config, origin::OriginResolver, token::TokenStore};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for connection pooling; carries the configured
    /// User-Agent/Referer pair on every upstream request
    pub http_client: Client,
    /// Token → upstream URL map
    pub tokens: TokenStore,
    /// Short-TTL cache of fetched playlist bodies
    pub playlist_cache: PlaylistCache,
    /// Candidate-origin prober for relative paths
    pub resolver: OriginResolver,
    /// Present when RATE_LIMIT_RPM > 0
    pub rate_limiter: Option<super::rate_limit::RateLimiter>,
    /// Present on the first state built in this process; later instances
    /// (tests) share the already-installed global recorder
    pub metrics_handle: Option<Arc<PrometheusHandle>>,
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Self {
        let mut default_headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&config.user_agent) {
            default_headers.insert(USER_AGENT, value);
        }
        if let Ok(value) = HeaderValue::from_str(&config.referer) {
            default_headers.insert(REFERER, value);
        }

        let http_client = Client::builder()
            .default_headers(default_headers)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        let tokens = TokenStore::new(config.master_ttl, config.segment_ttl);
        let resolver = OriginResolver::new(
            http_client.clone(),
            config.origin_urls.clone(),
            config.probe_timeout,
        );
        let rate_limiter = (config.rate_limit_rpm > 0)
            .then(|| super::rate_limit::RateLimiter::new(config.rate_limit_rpm));

        let metrics_handle = PrometheusBuilder::new()
            .install_recorder()
            .ok()
            .map(Arc::new);

        Self {
            config: Arc::new(config),
            http_client,
            tokens,
            playlist_cache: PlaylistCache::new(),
            resolver,
            rate_limiter,
            metrics_handle,
            started_at: Instant::now(),
        }
    }
}
