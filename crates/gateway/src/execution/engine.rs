use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use toolgate_common::config::{ExecutionConfig, RateLimitConfig};
use toolgate_common::error::ErrorKind;
use toolgate_common::ids::ExecutionId;
use toolgate_common::types::{
    AttemptRecord, ExecutionRecord, ExecutionStatus, ResolvedTool, ToolStatus,
};

use crate::health::HealthService;
use crate::rate_limit::{tenant_key, tool_key, AcquireResult, RateLimiter};
use crate::retry::{should_retry, AttemptOutcome};

use super::auth::apply_auth;
use super::http_client::build_request;
use super::ExecutionError;

/// Execution Engine: resolves an action, enforces rate
/// limits and health, runs the retry loop, and produces the Execution
/// Record the Audit Ledger will persist. The engine itself never talks to
/// PostgreSQL — the caller is responsible for calling the Audit Ledger
/// with the record this returns.
pub struct ExecutionEngine {
    http: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    health: Arc<HealthService>,
    config: ExecutionConfig,
    rate_limit: RateLimitConfig,
}

pub struct ExecutionOutcome {
    pub result: Value,
    pub record: ExecutionRecord,
    pub attempts: Vec<AttemptRecord>,
}

impl ExecutionEngine {
    pub fn new(
        http: reqwest::Client,
        rate_limiter: Arc<RateLimiter>,
        health: Arc<HealthService>,
        config: ExecutionConfig,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            http,
            rate_limiter,
            health,
            config,
            rate_limit,
        }
    }

    /// `deadline_ms` overrides `ExecutionConfig::deadline_ms` when the
    /// caller supplies one. `cancel` is observed at every suspension point
    /// in the retry loop (pre-attempt check, in-flight request, backoff
    /// sleep) — triggering it produces `ExecutionStatus::Aborted` the same
    /// way a blown deadline does.
    pub async fn execute(
        &self,
        resolved: &ResolvedTool,
        action_name: &str,
        parameters: Value,
        deadline_ms: Option<u64>,
        cancel: CancellationToken,
        actor: String,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let tool = &resolved.tool;

        if tool.status != ToolStatus::Active {
            return Err(ExecutionError::ToolDisabled);
        }

        let action = resolved
            .catalogue
            .find(action_name)
            .ok_or_else(|| ExecutionError::NotFound(action_name.to_string()))?;

        let built = build_request(&tool.base_url, action, &parameters)?;

        match self
            .rate_limiter
            .acquire(&tenant_key(tool.tenant_id), self.tenant_rate())
            .await
        {
            AcquireResult::Acquired => {}
            AcquireResult::Exhausted => return Err(ExecutionError::RateLimited),
        }
        match self
            .rate_limiter
            .acquire(&tool_key(tool.id), self.tool_rate())
            .await
        {
            AcquireResult::Acquired => {}
            AcquireResult::Exhausted => return Err(ExecutionError::RateLimited),
        }

        match self.health.cached(tool.id) {
            Some(snapshot) if !snapshot.is_healthy => return Err(ExecutionError::ToolUnhealthy),
            Some(_) => {}
            None => self.health.spawn_refresh(tool.id, tool.base_url.clone(), None),
        }

        let started_at = Utc::now();
        let deadline = Instant::now()
            + Duration::from_millis(deadline_ms.unwrap_or(self.config.deadline_ms));
        let per_attempt_timeout = Duration::from_millis(self.config.per_attempt_timeout_ms);

        let body_bytes = built
            .body
            .as_ref()
            .map(|v| serde_json::to_vec(v).unwrap_or_default())
            .unwrap_or_default();
        let path = url::Url::parse(&built.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| built.url.clone());

        let mut attempts = Vec::new();
        let mut attempt_index = 0u32;
        let mut backoff_before_ms = 0u64;

        loop {
            attempt_index += 1;

            if cancel.is_cancelled() {
                let record = self.record(
                    tool.id,
                    tool.tenant_id,
                    action_name,
                    &parameters,
                    ExecutionStatus::Aborted,
                    attempt_index - 1,
                    Some(ErrorKind::Cancelled),
                    started_at,
                    &actor,
                );
                return Err(ExecutionError::Cancelled(record, attempts));
            }

            if Instant::now() >= deadline {
                let record = self.record(
                    tool.id,
                    tool.tenant_id,
                    action_name,
                    &parameters,
                    ExecutionStatus::Aborted,
                    attempt_index - 1,
                    Some(ErrorKind::DeadlineExceeded),
                    started_at,
                    &actor,
                );
                return Err(ExecutionError::DeadlineExceeded(record, attempts));
            }

            let mut builder = self
                .http
                .request(built.method.clone(), &built.url)
                .query(&built.query)
                .timeout(per_attempt_timeout.min(deadline.saturating_duration_since(Instant::now())));
            for (name, value) in &built.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = &built.body {
                builder = builder.json(body);
            }
            builder = apply_auth(builder, &resolved.credential, built.method.as_str(), &path, &body_bytes);

            let attempt_start = Instant::now();
            let send_result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = builder.send() => Some(result),
            };
            let elapsed = attempt_start.elapsed();

            let send_result = match send_result {
                Some(result) => result,
                None => {
                    attempts.push(AttemptRecord {
                        attempt_index,
                        error_kind: Some(ErrorKind::Cancelled),
                        error_message: Some("execution cancelled".to_string()),
                        backoff_before_ms,
                        attempted_at: Utc::now(),
                    });
                    let record = self.record(
                        tool.id,
                        tool.tenant_id,
                        action_name,
                        &parameters,
                        ExecutionStatus::Aborted,
                        attempt_index,
                        Some(ErrorKind::Cancelled),
                        started_at,
                        &actor,
                    );
                    return Err(ExecutionError::Cancelled(record, attempts));
                }
            };

            let (outcome, error_kind, error_message, success_value) = match send_result {
                Ok(response) if response.status().is_success() => {
                    let value = response.json::<Value>().await.unwrap_or(Value::Null);
                    (AttemptOutcome::Success, None, None, Some(value))
                }
                Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    (
                        AttemptOutcome::RateLimited { retry_after },
                        Some(ErrorKind::RateLimitedUpstream),
                        Some(format!("status {}", response.status())),
                        None,
                    )
                }
                Ok(response) if response.status().is_server_error() => (
                    AttemptOutcome::ServerError,
                    Some(ErrorKind::UpstreamError),
                    Some(format!("status {}", response.status())),
                    None,
                ),
                Ok(response) if response.status() == reqwest::StatusCode::UNAUTHORIZED
                    || response.status() == reqwest::StatusCode::FORBIDDEN =>
                {
                    (
                        AttemptOutcome::AuthError,
                        Some(ErrorKind::AuthError),
                        Some(format!("status {}", response.status())),
                        None,
                    )
                }
                Ok(response) => (
                    AttemptOutcome::ClientError,
                    Some(ErrorKind::UpstreamClientError),
                    Some(format!("status {}", response.status())),
                    None,
                ),
                Err(e) if e.is_timeout() => (
                    AttemptOutcome::Network,
                    Some(ErrorKind::DeadlineExceeded),
                    Some(e.to_string()),
                    None,
                ),
                Err(e) => (
                    AttemptOutcome::Network,
                    Some(ErrorKind::Network),
                    Some(e.to_string()),
                    None,
                ),
            };

            attempts.push(AttemptRecord {
                attempt_index,
                error_kind,
                error_message: error_message.clone(),
                backoff_before_ms,
                attempted_at: Utc::now(),
            });

            if let AttemptOutcome::Success = outcome {
                let record = self.record(
                    tool.id,
                    tool.tenant_id,
                    action_name,
                    &parameters,
                    ExecutionStatus::Success,
                    attempt_index - 1,
                    None,
                    started_at,
                    &actor,
                );
                let _ = elapsed;
                return Ok(ExecutionOutcome {
                    result: success_value.unwrap_or(Value::Null),
                    record,
                    attempts,
                });
            }

            let decision = should_retry(attempt_index, outcome, &tool.retry_policy);
            if decision.give_up || Instant::now() + decision.retry_after >= deadline {
                let record = self.record(
                    tool.id,
                    tool.tenant_id,
                    action_name,
                    &parameters,
                    ExecutionStatus::Failure,
                    attempt_index,
                    error_kind,
                    started_at,
                    &actor,
                );
                return Err(ExecutionError::Upstream(
                    error_kind.unwrap_or(ErrorKind::UpstreamError),
                    record,
                    attempts,
                ));
            }

            backoff_before_ms = decision.retry_after.as_millis() as u64;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let record = self.record(
                        tool.id,
                        tool.tenant_id,
                        action_name,
                        &parameters,
                        ExecutionStatus::Aborted,
                        attempt_index,
                        Some(ErrorKind::Cancelled),
                        started_at,
                        &actor,
                    );
                    return Err(ExecutionError::Cancelled(record, attempts));
                }
                _ = tokio::time::sleep(decision.retry_after) => {}
            }
        }
    }

    fn tenant_rate(&self) -> f64 {
        // The rate only matters the first time a bucket is created for a
        // given key — the RateLimiter keeps no per-key config after that.
        self.rate_limit.tenant_rate
    }

    fn tool_rate(&self) -> f64 {
        self.rate_limit.tool_rate
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        tool_id: toolgate_common::ids::ToolId,
        tenant_id: toolgate_common::ids::TenantId,
        action: &str,
        parameters: &Value,
        status: ExecutionStatus,
        retry_count: u32,
        error_kind: Option<ErrorKind>,
        started_at: chrono::DateTime<Utc>,
        actor: &str,
    ) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: ExecutionId::new(),
            tool_id,
            tenant_id,
            action: action.to_string(),
            parameters: redact_parameters(parameters),
            status,
            retry_count,
            error_kind,
            latency_ms: (Utc::now() - started_at).num_milliseconds().max(0) as u64,
            started_at,
            actor: actor.to_string(),
        }
    }
}

/// Strips values under keys that look like credential material before an
/// Execution Record is persisted.
fn redact_parameters(parameters: &Value) -> Value {
    const SENSITIVE: [&str; 5] = ["token", "password", "secret", "authorization", "api_key"];

    match parameters {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let lower = key.to_lowercase();
                if SENSITIVE.iter().any(|s| lower.contains(s)) {
                    out.insert(key.clone(), Value::String("[redacted]".to_string()));
                } else {
                    out.insert(key.clone(), redact_parameters(value));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_parameters).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_token_like_keys() {
        let input = json!({"id": "42", "api_key": "sk-live-xyz", "nested": {"password": "hunter2"}});
        let redacted = redact_parameters(&input);
        assert_eq!(redacted["api_key"], "[redacted]");
        assert_eq!(redacted["nested"]["password"], "[redacted]");
        assert_eq!(redacted["id"], "42");
    }

    fn engine() -> ExecutionEngine {
        let http = reqwest::Client::new();
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_millis(50)));
        let health = Arc::new(HealthService::new(
            http.clone(),
            Duration::from_secs(300),
            Duration::from_secs(600),
            Duration::from_secs(5),
            "/".to_string(),
        ));
        ExecutionEngine::new(
            http,
            rate_limiter,
            health,
            ExecutionConfig {
                per_attempt_timeout_ms: 5000,
                deadline_ms: 5000,
            },
            RateLimitConfig {
                tenant_rate: 100.0,
                tool_rate: 100.0,
                max_queue_ms: 50,
            },
        )
    }

    fn resolved_tool() -> ResolvedTool {
        let now = Utc::now();
        let tool = toolgate_common::types::Tool {
            id: toolgate_common::ids::ToolId::new(),
            tenant_id: toolgate_common::ids::TenantId::new(),
            tool_name: "widgets".to_string(),
            display_name: "Widgets".to_string(),
            base_url: "https://api.example.com".to_string(),
            documentation_url: None,
            openapi_url: None,
            config: json!({}),
            credential_envelope: Vec::new(),
            auth_kind: "none".to_string(),
            retry_policy: toolgate_common::config::RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 100,
                max_delay_ms: 1000,
                multiplier: 2.0,
                jitter: 0.0,
                retry_on_timeout: true,
                retry_on_rate_limit: true,
            },
            status: ToolStatus::Active,
            health: None,
            created_at: now,
            updated_at: now,
            created_by: "test".to_string(),
            deleted_at: None,
        };

        ResolvedTool {
            tool,
            catalogue: toolgate_common::types::ActionCatalogue {
                actions: vec![toolgate_common::types::Action {
                    name: "list".to_string(),
                    method: "get".to_string(),
                    path: "/widgets".to_string(),
                    summary: None,
                    parameters: Vec::new(),
                    response_schema: None,
                    security_refs: Vec::new(),
                }],
                security_schemes: Default::default(),
            },
            credential: toolgate_common::types::AuthConfig::None,
        }
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_before_any_request() {
        let engine = engine();
        let resolved = resolved_tool();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine
            .execute(&resolved, "list", json!({}), None, cancel, "test".to_string())
            .await;

        assert!(matches!(result, Err(ExecutionError::Cancelled(..))));
    }
}
