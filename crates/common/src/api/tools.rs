use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AuthConfig, HealthSnapshot, RetryPolicy, ToolStatus};

/// POST /api/v1/tools request body.
#[derive(Clone, Debug, Deserialize)]
pub struct RegisterToolRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub openapi_url: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
    pub auth_config: AuthConfig,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default)]
    pub path: Option<String>,
}

/// PUT /api/v1/tools/{name} request body — all fields optional (patch).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateToolRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub openapi_url: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
    #[serde(default)]
    pub auth_config: Option<AuthConfig>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub status: Option<ToolStatus>,
}

/// Public view of a Tool — never includes the credential envelope.
#[derive(Clone, Debug, Serialize)]
pub struct ToolView {
    pub name: String,
    pub display_name: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    pub auth_kind: String,
    pub retry_policy: RetryPolicy,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSnapshot>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&crate::types::Tool> for ToolView {
    fn from(t: &crate::types::Tool) -> Self {
        Self {
            name: t.tool_name.clone(),
            display_name: t.display_name.clone(),
            base_url: t.base_url.clone(),
            documentation_url: t.documentation_url.clone(),
            auth_kind: t.auth_kind.clone(),
            retry_policy: t.retry_policy,
            status: t.status.clone(),
            health: t.health.clone(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Response for a successful `register`/`confirm` — the tool view plus a
/// short capability summary derived from the Action Catalogue.
#[derive(Clone, Debug, Serialize)]
pub struct RegisterToolResponse {
    #[serde(flatten)]
    pub tool: ToolView,
    pub capabilities: Vec<String>,
}

/// GET /api/v1/tools response entry — reuses `ToolView`.
pub type ListToolsResponse = Vec<ToolView>;

/// GET /api/v1/tools/{name}/actions response entry.
#[derive(Clone, Debug, Serialize)]
pub struct ActionView {
    pub name: String,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub parameters: Vec<crate::types::ParameterDescriptor>,
}

impl From<&crate::types::Action> for ActionView {
    fn from(a: &crate::types::Action) -> Self {
        Self {
            name: a.name.clone(),
            method: a.method.clone(),
            path: a.path.clone(),
            summary: a.summary.clone(),
            parameters: a.parameters.clone(),
        }
    }
}

/// Uniform error body.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn from_kind(kind: crate::error::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: kind.code().to_string(),
            details: None,
        }
    }
}
