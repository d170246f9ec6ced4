use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use toolgate_common::api::discovery::StartDiscoveryRequest;
use toolgate_common::types::{DiscoveryResult, DiscoveryStatus, SpecCacheEntry};

use crate::AppState;

/// POST /discover — called internally by `toolgate-gateway`. Runs the
/// Discovery Engine's strategy list and, on success, warms the Spec
/// Cache so a subsequent Action Generator pass doesn't refetch.
pub async fn discover_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartDiscoveryRequest>,
) -> Result<Json<DiscoveryResult>, (StatusCode, String)> {
    let span = tracing::info_span!("discovery", base_url = %request.base_url);
    let _enter = span.enter();

    let result = state
        .discovery
        .discover(&request.base_url, request.hints)
        .await;

    if result.status == DiscoveryStatus::Succeeded {
        if let (Some(url), Some(spec_text), Some(spec_hash)) =
            (&result.selected_url, &result.spec_text, &result.spec_hash)
        {
            let mut cache = state.cache.write().await;
            cache.set(
                SpecCacheEntry {
                    url: url.clone(),
                    spec_hash: spec_hash.clone(),
                    raw_spec: spec_text.clone(),
                    content_type: Some("application/json".to_string()),
                    expires_at: chrono::Utc::now()
                        + chrono::Duration::from_std(state.spec_ttl).unwrap_or_default(),
                },
                state.spec_ttl,
            );
        }
        metrics::counter!("toolgate.discovery.succeeded").increment(1);
    } else {
        metrics::counter!("toolgate.discovery.not_succeeded").increment(1);
    }

    Ok(Json(result))
}
