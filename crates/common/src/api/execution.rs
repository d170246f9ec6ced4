use serde::{Deserialize, Serialize};
use serde_json::Value;

/// POST /api/v1/tools/{name}/actions/{action} request body.
#[derive(Clone, Debug, Deserialize)]
pub struct ExecuteActionRequest {
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub context_id: Option<String>,
    /// Overrides the gateway's default execution deadline for this call.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// POST .../actions/{action} response body on success.
#[derive(Clone, Debug, Serialize)]
pub struct ExecuteActionResponse {
    pub result: Value,
    pub execution_time_ms: u64,
    pub retry_attempts: u32,
}

/// POST /api/v1/tools/{name}/test response body.
#[derive(Clone, Debug, Serialize)]
pub struct TestToolResponse {
    #[serde(flatten)]
    pub snapshot: crate::types::HealthSnapshot,
}
