use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::sync::RwLock;

mod cache;
mod discovery;
mod rate_limit;
mod routes;
mod security;

use cache::SpecCache;
use discovery::DiscoveryEngine;
use rate_limit::DomainRateLimiter;

/// Shared application state for the fetch sidecar.
pub struct AppState {
    pub cache: Arc<RwLock<SpecCache>>,
    pub discovery: DiscoveryEngine,
    pub spec_ttl: Duration,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("toolgate-fetch starting");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder");

    let allow_insecure = std::env::var("ALLOW_INSECURE_HTTP")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let rate_limit: f64 = std::env::var("FETCH_DOMAIN_RATE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2.0);

    let spec_ttl_secs: u64 = std::env::var("FETCH_SPEC_CACHE_TTL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(900);

    let max_spec_bytes: usize = std::env::var("FETCH_MAX_SPEC_BYTES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10 * 1024 * 1024);

    let http = reqwest::Client::builder()
        .user_agent("toolgate-fetch/0.1")
        // Redirects are followed manually, one hop at a time, so each
        // hop can be revalidated against the Security Gate.
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build HTTP client");

    let discovery = DiscoveryEngine::new(
        http,
        Arc::new(DomainRateLimiter::new(rate_limit)),
        allow_insecure,
        Duration::from_secs(5),
        Duration::from_secs(10),
        max_spec_bytes,
    );

    let state = Arc::new(AppState {
        cache: Arc::new(RwLock::new(SpecCache::new())),
        discovery,
        spec_ttl: Duration::from_secs(spec_ttl_secs),
        metrics_handle,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/discover", post(routes::discover_handler))
        .with_state(state);

    let port: u16 = std::env::var("FETCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8081);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind TCP listener");

    tracing::info!(port, "toolgate-fetch listening");

    axum::serve(listener, app).await.expect("HTTP server error");
}

async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "healthy" })),
    )
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
