use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HealthSnapshot, RetryPolicy};
use crate::ids::{TenantId, ToolId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Active,
    Disabled,
    Error,
}

impl ToolStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Error => "error",
        }
    }

    /// Which transitions a tenant-initiated update may make.
    /// `Error` is reachable only by the system itself, never by a patch.
    pub fn can_transition_to(&self, next: &ToolStatus) -> bool {
        matches!(
            (self, next),
            (ToolStatus::Active, ToolStatus::Disabled)
                | (ToolStatus::Disabled, ToolStatus::Active)
                | (ToolStatus::Active, ToolStatus::Active)
                | (ToolStatus::Disabled, ToolStatus::Disabled)
        )
    }
}

/// A registered upstream HTTP API instance scoped to a tenant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tool {
    pub id: ToolId,
    pub tenant_id: TenantId,
    pub tool_name: String,
    pub display_name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi_url: Option<String>,
    #[serde(default)]
    pub config: Value,
    /// Envelope bytes from `vault::encrypt` — opaque here, never decoded
    /// outside the Credential Vault's accessor.
    #[serde(skip)]
    pub credential_envelope: Vec<u8>,
    /// The scheme tag this tool authenticates with, or `"none"`.
    pub auth_kind: String,
    pub retry_policy: RetryPolicy,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tool {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A frame-scoped, immutable snapshot the Registry hands to the Execution
/// Engine. Credentials are
/// decrypted only for the lifetime of this value and must not outlive a
/// single execution.
pub struct ResolvedTool {
    pub tool: Tool,
    pub catalogue: super::ActionCatalogue,
    pub credential: super::AuthConfig,
}
