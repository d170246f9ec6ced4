use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use toolgate_common::api::discovery::{
    ConfirmDiscoveryRequest, DiscoveryHints, StartDiscoveryRequest, StartDiscoveryResponse,
};
use toolgate_common::api::execution::{ExecuteActionRequest, ExecuteActionResponse, TestToolResponse};
use toolgate_common::api::tools::{
    ActionView, ErrorResponse, ListToolsResponse, RegisterToolRequest, RegisterToolResponse,
    ToolView, UpdateToolRequest,
};
use toolgate_common::error::ErrorKind;
use toolgate_common::ids::{DiscoverySessionId, TenantId};
use toolgate_common::types::{DiscoverySession, DiscoveryStatus};

use crate::execution::scoped_key;
use crate::health::ProbeTarget;
use crate::registry::{RawSpec, UpdatePatch};
use crate::AppState;

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

fn api_error(kind: ErrorKind, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from_kind(kind, message)))
}

/// Every route is tenant-scoped — the tenant id is resolved
/// from the bearer token. There's no separate identity service in this
/// topology, so the token *is* the tenant id.
fn tenant_from_headers(headers: &HeaderMap) -> ApiResult<TenantId> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| api_error(ErrorKind::Unauthorized, "missing bearer token"))?;

    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|_| api_error(ErrorKind::Unauthorized, "bearer token is not a valid tenant id"))?;

    Ok(TenantId::from_uuid(uuid))
}

pub async fn register_tool_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterToolRequest>,
) -> ApiResult<(StatusCode, Json<RegisterToolResponse>)> {
    let tenant_id = tenant_from_headers(&headers)?;

    let raw_spec = if let Some(url) = &req.openapi_url {
        let result = state
            .spec_client
            .discover(
                &req.base_url,
                Some(DiscoveryHints {
                    openapi_url: Some(url.clone()),
                    doc_url: None,
                    openapi_paths: Vec::new(),
                }),
            )
            .await
            .map_err(|e| api_error(e.kind(), e.to_string()))?;

        match result.status {
            DiscoveryStatus::Succeeded => Some(RawSpec {
                hash: result.spec_hash.unwrap_or_default(),
                text: result.spec_text.unwrap_or_default(),
            }),
            _ => return Err(api_error(ErrorKind::NoSpecFound, "openapi_url did not resolve to a spec")),
        }
    } else {
        None
    };

    let mut config = req.config.unwrap_or_else(|| serde_json::json!({}));
    if let Some(path) = req.health_check.and_then(|h| h.path) {
        if let Some(obj) = config.as_object_mut() {
            obj.insert(
                "health_check".to_string(),
                serde_json::json!({ "path": path }),
            );
        }
    }

    let (tool, catalogue) = state
        .registry
        .register(
            tenant_id,
            req.name,
            req.display_name.unwrap_or_default(),
            req.base_url,
            req.documentation_url,
            req.openapi_url,
            config,
            req.auth_config,
            req.retry_policy,
            raw_spec,
            "tenant".to_string(),
        )
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterToolResponse {
            tool: ToolView::from(&tool),
            capabilities: catalogue.actions.iter().map(|a| a.name.clone()).collect(),
        }),
    ))
}

pub async fn list_tools_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ListToolsResponse>> {
    let tenant_id = tenant_from_headers(&headers)?;
    let tools = state
        .registry
        .list(tenant_id)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;
    Ok(Json(tools.iter().map(ToolView::from).collect()))
}

pub async fn get_tool_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult<Json<ToolView>> {
    let tenant_id = tenant_from_headers(&headers)?;
    let tool = state
        .registry
        .get(tenant_id, &name)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;
    Ok(Json(ToolView::from(&tool)))
}

pub async fn update_tool_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(req): Json<UpdateToolRequest>,
) -> ApiResult<Json<ToolView>> {
    let tenant_id = tenant_from_headers(&headers)?;
    let patch = UpdatePatch {
        display_name: req.display_name,
        base_url: req.base_url,
        documentation_url: req.documentation_url,
        openapi_url: req.openapi_url,
        auth_config: req.auth_config,
        config: req.config,
        retry_policy: req.retry_policy,
        status: req.status,
    };
    let tool = state
        .registry
        .update(tenant_id, &name, patch, &state.spec_client)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;
    Ok(Json(ToolView::from(&tool)))
}

pub async fn delete_tool_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    let tenant_id = tenant_from_headers(&headers)?;
    state
        .registry
        .delete(tenant_id, &name)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_actions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<ActionView>>> {
    let tenant_id = tenant_from_headers(&headers)?;
    let resolved = state
        .registry
        .resolve(tenant_id, &name)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;
    Ok(Json(resolved.catalogue.actions.iter().map(ActionView::from).collect()))
}

pub async fn test_tool_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult<Json<TestToolResponse>> {
    let tenant_id = tenant_from_headers(&headers)?;
    let tool = state
        .registry
        .get(tenant_id, &name)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;

    let health_path = tool
        .config
        .get("health_check")
        .and_then(|h| h.get("path"))
        .and_then(|p| p.as_str());

    let snapshot = state
        .health
        .check(
            ProbeTarget {
                tool_id: tool.id,
                base_url: &tool.base_url,
                health_path,
            },
            true,
        )
        .await;

    Ok(Json(TestToolResponse { snapshot }))
}

pub async fn execute_action_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((name, action)): Path<(String, String)>,
    Json(req): Json<ExecuteActionRequest>,
) -> ApiResult<Json<ExecuteActionResponse>> {
    let tenant_id = tenant_from_headers(&headers)?;
    let resolved = state
        .registry
        .resolve(tenant_id, &name)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;

    let cancel_key = req
        .context_id
        .as_deref()
        .map(|context_id| scoped_key(tenant_id, context_id));
    let cancel = match &cancel_key {
        Some(key) => state.cancellations.register(key.clone()),
        None => tokio_util::sync::CancellationToken::new(),
    };

    let outcome = state
        .execution
        .execute(&resolved, &action, req.parameters, req.deadline_ms, cancel, "tenant".to_string())
        .await;

    if let Some(key) = &cancel_key {
        state.cancellations.remove(key);
    }

    match outcome {
        Ok(outcome) => {
            let retry_attempts = outcome.attempts.len().saturating_sub(1) as u32;
            let latency_ms = outcome.record.latency_ms;
            state
                .audit
                .record(&outcome.record, &outcome.attempts)
                .await
                .map_err(|e| api_error(ErrorKind::StorageUnavailable, e.to_string()))?;
            Ok(Json(ExecuteActionResponse {
                result: outcome.result,
                execution_time_ms: latency_ms,
                retry_attempts,
            }))
        }
        Err(e) => {
            let kind = e.kind();
            let message = e.message();
            if let Some((record, attempts)) = e.into_record() {
                if let Err(err) = state.audit.record(&record, &attempts).await {
                    tracing::error!(error = %err, "failed to persist execution record");
                }
            }
            Err(api_error(kind, message))
        }
    }
}

/// Cancel an in-flight execution by the `context_id` its caller supplied
/// when starting it. Tenant-scoped: a caller can only cancel executions
/// registered under their own tenant id.
pub async fn cancel_execution_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(context_id): Path<String>,
) -> ApiResult<StatusCode> {
    let tenant_id = tenant_from_headers(&headers)?;
    let key = scoped_key(tenant_id, &context_id);
    if state.cancellations.cancel(&key) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(ErrorKind::NotFound, "no in-flight execution for this context_id"))
    }
}

pub async fn start_discovery_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<StartDiscoveryRequest>,
) -> ApiResult<Json<StartDiscoveryResponse>> {
    let tenant_id = tenant_from_headers(&headers)?;
    let tool_name = req
        .name
        .clone()
        .ok_or_else(|| api_error(ErrorKind::InvalidConfig, "name is required to start discovery"))?;

    let result = state
        .spec_client
        .discover(&req.base_url, req.hints)
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;

    let now = chrono::Utc::now();
    let expires_at = now + chrono::Duration::seconds(state.discovery_session_ttl_seconds as i64);

    let session = DiscoverySession {
        id: DiscoverySessionId::new(),
        tenant_id,
        base_url: req.base_url,
        tool_name,
        display_name: req.display_name,
        candidates: result.candidates.clone(),
        status: result.status.clone(),
        selected_url: result.selected_url.clone(),
        created_at: now,
        expires_at,
    };
    let session_id = state.registry.sessions().insert(session);

    Ok(Json(StartDiscoveryResponse {
        session_id: session_id.to_string(),
        status: result.status,
        suggestions: result.candidates,
        expires_in: state.discovery_session_ttl_seconds,
    }))
}

/// Confirm a candidate from a Discovery Session and register the tool.
pub async fn confirm_discovery_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(req): Json<ConfirmDiscoveryRequest>,
) -> ApiResult<(StatusCode, Json<RegisterToolResponse>)> {
    let tenant_id = tenant_from_headers(&headers)?;

    let session_id = uuid::Uuid::parse_str(&session_id)
        .map(DiscoverySessionId::from_uuid)
        .map_err(|_| api_error(ErrorKind::NotFound, "invalid session id"))?;

    let session = state
        .registry
        .sessions()
        .get(session_id)
        .filter(|s| s.tenant_id == tenant_id)
        .ok_or_else(|| api_error(ErrorKind::NotFound, "discovery session not found or expired"))?;

    if !session.candidates.iter().any(|c| c.url == req.selected_url) {
        return Err(api_error(
            ErrorKind::InvalidConfig,
            "selected_url is not among the session's candidates",
        ));
    }

    let result = state
        .spec_client
        .discover(
            &session.base_url,
            Some(DiscoveryHints {
                openapi_url: Some(req.selected_url.clone()),
                doc_url: None,
                openapi_paths: Vec::new(),
            }),
        )
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;

    if result.status != DiscoveryStatus::Succeeded {
        return Err(api_error(ErrorKind::NoSpecFound, "selected_url did not resolve to a spec"));
    }

    let auth_config = match req.auth_token {
        Some(token) => toolgate_common::types::AuthConfig::Bearer { token },
        None => toolgate_common::types::AuthConfig::None,
    };

    let (tool, catalogue) = state
        .registry
        .register(
            tenant_id,
            session.tool_name.clone(),
            session.display_name.clone().unwrap_or_default(),
            session.base_url.clone(),
            None,
            Some(req.selected_url),
            serde_json::json!({}),
            auth_config,
            None,
            Some(RawSpec {
                hash: result.spec_hash.unwrap_or_default(),
                text: result.spec_text.unwrap_or_default(),
            }),
            "tenant".to_string(),
        )
        .await
        .map_err(|e| api_error(e.kind(), e.to_string()))?;

    state.registry.sessions().remove(session_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterToolResponse {
            tool: ToolView::from(&tool),
            capabilities: catalogue.actions.iter().map(|a| a.name.clone()).collect(),
        }),
    ))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.registry.store().health_check().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "healthy"}))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "unhealthy", "error": e.to_string()})),
        ),
    }
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
