//! Poster/thumbnail proxy.
//!
//! Keeps artwork same-origin for browser clients. Relative paths join onto
//! the configured image base; absolute URLs go through the same validation
//! as stream targets. Artwork is immutable, so clients may cache for a day.

use crate::{
    error::{ProxyError, Result},
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

const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";
const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

pub async fn serve_image(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();
    let result = proxy_image(&params, &state).await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.status(),
    };
    metrics::record_request("image", status.as_u16());
    metrics::record_duration("image", start);

    result
}

async fn proxy_image(params: &HashMap<String, String>, state: &AppState) -> Result<Response> {
    // Route is only mounted when the base is configured
    let base = state
        .config
        .image_base_url
        .as_deref()
        .ok_or_else(|| ProxyError::Internal("image proxy not configured".into()))?;

    let path = params
        .get("path")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProxyError::InvalidRequest("missing path parameter".into()))?;

    let url = if path.starts_with("http://") || path.starts_with("https://") {
        validate_target_url(path, &state.config)?.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    };

    let response = state
        .http_client
        .get(&url)
        .timeout(state.config.media_timeout)
        .send()
        .await?;

    match response.status() {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND => return Err(ProxyError::NotFound(url)),
        other => return Err(ProxyError::UpstreamStatus(other)),
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE)
        .to_string();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.as_str()),
            (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL),
        ],
        Body::from_stream(response.bytes_stream()),
    )
        .into_response())
}
