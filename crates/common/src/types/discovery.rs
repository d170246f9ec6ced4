use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DiscoverySessionId, TenantId};

/// Type tag of a candidate OpenAPI URL surfaced by a Discovery strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateType {
    Hint,
    WellKnown,
    Doc,
    HtmlLink,
}

/// A ranked candidate URL for a tool's OpenAPI document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub candidate_type: CandidateType,
}

/// Outcome of a Discovery Engine run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    Succeeded,
    NeedsConfirmation,
    Failed,
}

/// Result of running the Discovery Engine's strategy list against a base
/// URL. `spec_text`/`spec_hash` are populated only when `status ==
/// Succeeded`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub status: DiscoveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_hash: Option<String>,
    /// Sorted by (confidence desc, url asc).4 determinism.
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Short-lived, tenant-scoped state tracking candidates awaiting
/// confirmation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoverySession {
    pub id: DiscoverySessionId,
    pub tenant_id: TenantId,
    pub base_url: String,
    pub tool_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub candidates: Vec<Candidate>,
    pub status: DiscoveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DiscoverySession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
