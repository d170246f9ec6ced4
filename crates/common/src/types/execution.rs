use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;
use crate::ids::{ExecutionId, ToolId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Aborted,
}

/// One outbound HTTP call within an Execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Redacted — never contains credential material or raw header values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub backoff_before_ms: u64,
    pub attempted_at: DateTime<Utc>,
}

/// The full lifecycle record of a single caller invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    pub tool_id: ToolId,
    pub tenant_id: crate::ids::TenantId,
    pub action: String,
    /// Redacted — path/query/body values that look like credentials are
    /// stripped before this is persisted.
    pub parameters: Value,
    pub status: ExecutionStatus,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub latency_ms: u64,
    pub started_at: DateTime<Utc>,
    pub actor: String,
}
