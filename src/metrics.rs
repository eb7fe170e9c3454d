//! Prometheus metrics helpers.
//!
//! Thin wrappers over the `metrics` facade so handlers record consistent
//! label sets. The recorder itself is installed once in `AppState`.

use metrics::{counter, histogram};
use std::time::Instant;

/// Count a handled request by endpoint and response status.
pub fn record_request(endpoint: &str, status: u16) {
    counter!(
        "hlsgate_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a request duration by endpoint.
pub fn record_duration(endpoint: &str, start: Instant) {
    histogram!(
        "hlsgate_request_duration_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Count an upstream fetch failure.
pub fn record_origin_error() {
    counter!("hlsgate_origin_errors_total").increment(1);
}

/// Count tokens registered, labelled by TTL class.
pub fn record_token_registered(class: &str) {
    counter!("hlsgate_tokens_registered_total", "class" => class.to_string()).increment(1);
}
