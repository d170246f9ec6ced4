use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health Service probe result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub is_healthy: bool,
    pub last_checked: DateTime<Utc>,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub was_cached: bool,
}
