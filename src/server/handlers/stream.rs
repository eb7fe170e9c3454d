//! The stream proxy endpoint.
//!
//! Accepts three request forms in priority order — `?t=` (token), `?url=`
//! (allow-listed absolute URL), `?path=` (relative path resolved across
//! candidate origins) — fetches the target, and either streams media bytes
//! through or rewrites playlist text so every embedded URI points back here.

use crate::{
    error::{ProxyError, Result},
    hls::{self, BaseRef, RewriteContext},
    metrics,
    server::{state::AppState, url_validation::validate_target_url},
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

const MPEGURL_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const DEFAULT_MEDIA_CONTENT_TYPE: &str = "video/mp2t";
/// Rewritten playlists embed short-lived tokens — keep client caching short.
const PLAYLIST_CACHE_CONTROL: &str = "public, max-age=30";
/// Segments are immutable once published.
const MEDIA_CACHE_CONTROL: &str = "public, max-age=300";

/// Where an inbound request resolved to.
enum Target {
    /// Absolute upstream URL from a token or an allow-listed `?url=`
    Absolute(String),
    /// Relative path probed across candidate origins; carries the winning
    /// probe response so the chosen origin is fetched exactly once
    Probed {
        path: String,
        response: reqwest::Response,
    },
}

/// Proxy a stream request
pub async fn serve_stream(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    let result = proxy_stream(&params, &state).await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => {
            if matches!(
                e,
                ProxyError::Upstream(_)
                    | ProxyError::UpstreamStatus(_)
                    | ProxyError::OriginExhausted { .. }
            ) {
                metrics::record_origin_error();
            }
            e.status()
        }
    };
    metrics::record_request("stream", status.as_u16());
    metrics::record_duration("stream", start);

    result
}

async fn proxy_stream(params: &HashMap<String, String>, state: &AppState) -> Result<Response> {
    match resolve_target(params, state).await? {
        Target::Absolute(url) => {
            if hls::is_playlist_path(&url) {
                let body = fetch_playlist_text(state, &url).await?;
                return Ok(rewritten_response(&body, &BaseRef::Absolute(url), state));
            }

            let response = fetch_media(state, &url).await?;
            // The URL did not look like a playlist but the origin says it is
            // one — trust the content type and rewrite anyway.
            if has_playlist_content_type(&response) {
                let body = response.text().await?;
                return Ok(rewritten_response(&body, &BaseRef::Absolute(url), state));
            }
            Ok(passthrough_response(response))
        }

        Target::Probed { path, response } => {
            if hls::is_playlist_path(&path) || has_playlist_content_type(&response) {
                let body = response.text().await?;
                // Origin choice stays deferred: segments of this playlist are
                // re-resolved individually when the player fetches them.
                return Ok(rewritten_response(&body, &BaseRef::RelativeDir(path), state));
            }
            Ok(passthrough_response(response))
        }
    }
}

/// TARGET_RESOLUTION: token, then explicit URL, then relative path.
async fn resolve_target(
    params: &HashMap<String, String>,
    state: &AppState,
) -> Result<Target> {
    if let Some(token) = params.get("t") {
        let url = state
            .tokens
            .resolve(token)
            .ok_or(ProxyError::TokenNotFound)?;
        debug!("Token resolved");
        return Ok(Target::Absolute(url));
    }

    if let Some(raw) = params.get("url") {
        let url = validate_target_url(raw, &state.config)?;
        info!("Direct URL request admitted for host {:?}", url.host_str());
        return Ok(Target::Absolute(url.to_string()));
    }

    if let Some(raw) = params.get("path") {
        let path = raw.trim().trim_start_matches('/').to_string();
        if path.is_empty() {
            return Err(ProxyError::InvalidRequest("empty path parameter".into()));
        }
        let resolved = state.resolver.resolve(&path).await?;
        debug!("Path resolved via {}", resolved.url);
        return Ok(Target::Probed {
            path,
            response: resolved.response,
        });
    }

    Err(ProxyError::InvalidRequest(
        "missing t, url or path parameter".into(),
    ))
}

/// Fetch a playlist body, consulting the short-TTL cache first.
async fn fetch_playlist_text(state: &AppState, url: &str) -> Result<String> {
    if let Some(body) = state.playlist_cache.get(url) {
        return Ok(body);
    }

    let response = state
        .http_client
        .get(url)
        .timeout(state.config.playlist_timeout)
        .send()
        .await?;
    if response.status() != StatusCode::OK {
        return Err(ProxyError::UpstreamStatus(response.status()));
    }

    let body = response.text().await?;
    state.playlist_cache.insert(url, body.clone());
    Ok(body)
}

/// Single GET against an already-resolved URL — no retries.
async fn fetch_media(state: &AppState, url: &str) -> Result<reqwest::Response> {
    let response = state
        .http_client
        .get(url)
        .timeout(state.config.media_timeout)
        .send()
        .await?;
    if response.status() != StatusCode::OK {
        return Err(ProxyError::UpstreamStatus(response.status()));
    }
    Ok(response)
}

fn has_playlist_content_type(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("mpegurl"))
        .unwrap_or(false)
}

/// REWRITE branch: buffer, rewrite, short cache lifetime.
fn rewritten_response(body: &str, base: &BaseRef, state: &AppState) -> Response {
    let endpoint = state.config.stream_endpoint();
    let ctx = RewriteContext {
        endpoint: &endpoint,
        mode: &state.config.rewrite_mode,
        tokens: &state.tokens,
    };
    let rewritten = hls::rewrite_playlist(body, base, &ctx);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, MPEGURL_CONTENT_TYPE),
            (header::CACHE_CONTROL, PLAYLIST_CACHE_CONTROL),
        ],
        rewritten,
    )
        .into_response()
}

/// PASSTHROUGH branch: stream the upstream body without buffering. Dropping
/// the response body on client disconnect cancels the upstream transfer.
fn passthrough_response(response: reqwest::Response) -> Response {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_MEDIA_CONTENT_TYPE)
        .to_string();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.as_str()),
            (header::CACHE_CONTROL, MEDIA_CACHE_CONTROL),
        ],
        Body::from_stream(response.bytes_stream()),
    )
        .into_response()
}
