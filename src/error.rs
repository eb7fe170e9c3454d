use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Proxy-level error taxonomy.
///
/// Client-visible bodies are generic on purpose: upstream identity and error
/// detail go to the logs, never into the response.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or malformed request parameters
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Target URL rejected by the domain allow-list or SSRF policy
    #[error("target not allowed: {0}")]
    Forbidden(String),

    /// Token missing from the store, or expired — indistinguishable by design
    #[error("invalid or expired token")]
    TokenNotFound,

    /// Upstream resource genuinely absent (mirrored 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// All candidate origins probed without a 200; carries the last observed
    /// upstream status for propagation, if any
    #[error("no origin resolved the requested path (last status: {last_status:?})")]
    OriginExhausted {
        last_status: Option<StatusCode>,
        detail: String,
    },

    /// Network failure or timeout talking to an already-resolved origin
    #[error("upstream fetch failed")]
    Upstream(#[from] reqwest::Error),

    /// Origin answered the resolved fetch with a non-200 status
    #[error("upstream returned {0}")]
    UpstreamStatus(StatusCode),

    /// Rewrite or decode failure on an otherwise-successful fetch
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Forbidden(_) => StatusCode::FORBIDDEN,
            ProxyError::TokenNotFound | ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            // Propagate a known upstream status (a 404 from the last mirror
            // is more useful to players than a blanket 502).
            ProxyError::OriginExhausted { last_status, .. } => (*last_status)
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::NOT_FOUND),
            ProxyError::Upstream(_) | ProxyError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = match &self {
            ProxyError::InvalidRequest(detail) => {
                warn!("Rejected request: {}", detail);
                "Missing or invalid parameters"
            }
            ProxyError::Forbidden(detail) => {
                warn!("Blocked target: {}", detail);
                "URL not allowed"
            }
            ProxyError::TokenNotFound => "Invalid or expired token",
            ProxyError::NotFound(detail) => {
                warn!("Upstream resource missing: {}", detail);
                "Not found"
            }
            ProxyError::OriginExhausted { detail, .. } => {
                warn!("Origin resolution exhausted: {}", detail);
                "Stream not found"
            }
            ProxyError::Upstream(e) => {
                error!("Upstream fetch error: {}", e);
                "Error fetching stream"
            }
            ProxyError::UpstreamStatus(code) => {
                warn!("Upstream answered {}", code);
                "Error fetching stream"
            }
            ProxyError::Internal(detail) => {
                error!("Internal proxy error: {}", detail);
                "Error loading stream"
            }
        };

        (self.status(), body).into_response()
    }
}
