use std::env;
use std::time::Duration;

/// How rewritten playlist lines reference the proxy
#[derive(Clone, Debug, PartialEq)]
pub enum RewriteMode {
    /// Register each target in the token store and emit `?t=<token>` —
    /// clients never see upstream URLs (default)
    Token,
    /// Embed the encoded target directly as `?url=` / `?path=`
    Direct,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Prefix baked into rewritten playlist references; empty = relative references
    pub public_base_url: String,
    /// Ordered candidate origins for relative-path resolution (first success wins)
    pub origin_urls: Vec<String>,
    /// Allow-listed upstream domains for `?url=` requests (suffix match);
    /// empty = accept any
    pub allowed_domains: Vec<String>,
    /// Header pair sent on every upstream request — many origins gate on these
    pub user_agent: String,
    pub referer: String,
    pub is_dev: bool,
    /// Reference emission policy for the playlist rewriter
    pub rewrite_mode: RewriteMode,
    /// Token TTL for master playlists
    pub master_ttl: Duration,
    /// Token TTL for media segments
    pub segment_ttl: Duration,
    /// Per-candidate timeout during origin probing
    pub probe_timeout: Duration,
    /// Timeout for playlist fetches (buffered fully in memory)
    pub playlist_timeout: Duration,
    /// Timeout for media fetches (streamed through)
    pub media_timeout: Duration,
    /// Per-IP requests per minute; 0 disables rate limiting
    pub rate_limit_rpm: u32,
    /// Base URL for the adjacent image proxy; unset disables the endpoint
    pub image_base_url: Option<String>,
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn duration_var(name: &str, default_secs: u64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

fn list_var(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and
    /// ORIGIN_URLS are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let origin_urls = list_var("ORIGIN_URLS");
        let origin_urls = if origin_urls.is_empty() {
            if is_dev {
                vec!["https://example.com".to_string()]
            } else {
                return Err("ORIGIN_URLS is required in production".into());
            }
        } else {
            origin_urls
        };

        // Empty means rewritten references are relative to the proxy itself,
        // which players resolve against the playlist URL.
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        let allowed_domains = list_var("ALLOWED_STREAM_DOMAINS");

        let user_agent =
            env::var("UPSTREAM_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());
        let referer =
            env::var("UPSTREAM_REFERER").unwrap_or_else(|_| format!("{}/", origin_urls[0]));

        let rewrite_mode = match env::var("REWRITE_MODE")
            .unwrap_or_else(|_| "token".to_string())
            .to_lowercase()
            .as_str()
        {
            "direct" => RewriteMode::Direct,
            _ => RewriteMode::Token,
        };

        let rate_limit_rpm = env::var("RATE_LIMIT_RPM")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);

        let image_base_url = env::var("IMAGE_BASE_URL")
            .ok()
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        Ok(Config {
            port,
            public_base_url,
            origin_urls,
            allowed_domains,
            user_agent,
            referer,
            is_dev,
            rewrite_mode,
            master_ttl: duration_var("TOKEN_TTL_MASTER_SECS", 2 * 60 * 60),
            segment_ttl: duration_var("TOKEN_TTL_SEGMENT_SECS", 10 * 60),
            probe_timeout: duration_var("ORIGIN_PROBE_TIMEOUT_SECS", 8),
            playlist_timeout: duration_var("PLAYLIST_FETCH_TIMEOUT_SECS", 30),
            media_timeout: duration_var("MEDIA_FETCH_TIMEOUT_SECS", 60),
            rate_limit_rpm,
            image_base_url,
        })
    }

    /// Proxy endpoint baked into rewritten playlist references
    pub fn stream_endpoint(&self) -> String {
        format!("{}/stream", self.public_base_url)
    }
}
