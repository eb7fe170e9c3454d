pub mod handlers;
pub mod rate_limit;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use state::AppState;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

/// Stamp every response with the proxy version.
async fn version_header(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        "x-hlsgate-version",
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Periodic sweep of expired tokens, stale playlist bodies, and rate-limit
/// windows. Runs at half the segment TTL so expired-but-never-read tokens
/// cannot accumulate between restarts.
fn spawn_janitor(state: AppState) {
    let period = (state.config.segment_ttl / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.tokens.purge_expired();
            state.playlist_cache.purge_expired();
            if let Some(ref limiter) = state.rate_limiter {
                limiter.purge_expired();
            }
            debug!("Janitor sweep done; {} live tokens", state.tokens.len());
        }
    });
}

/// Build the Axum router with all routes and middleware
pub async fn build_router(config: Config) -> Router {
    let state = AppState::new(config);
    spawn_janitor(state.clone());

    // Players usually run on a different origin than the proxy
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    let mut router = Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics_export))
        .route("/stream", get(handlers::stream::serve_stream));

    if state.config.image_base_url.is_some() {
        router = router.route("/image", get(handlers::image::serve_image));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn(version_header))
        .layer(cors)
        .with_state(state)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let app = build_router(config).await;

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
