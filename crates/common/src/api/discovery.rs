use serde::{Deserialize, Serialize};

/// POST /api/v1/tools/discover request body. Also used by the gateway's
/// `SpecClient` to call the fetch sidecar's own `/discover` route, so it
/// needs to serialize as well as deserialize.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartDiscoveryRequest {
    pub base_url: String,
    #[serde(default)]
    pub hints: Option<DiscoveryHints>,
    /// Reserved for the eventual Tool row's `tool_name` — absent when
    /// this request is the gateway-internal call to the fetch sidecar,
    /// required when it's the tenant-facing `/discover` call.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiscoveryHints {
    #[serde(default)]
    pub openapi_url: Option<String>,
    #[serde(default)]
    pub doc_url: Option<String>,
    #[serde(default)]
    pub openapi_paths: Vec<String>,
}

/// POST /api/v1/tools/discover response body.
#[derive(Clone, Debug, Serialize)]
pub struct StartDiscoveryResponse {
    pub session_id: String,
    pub status: crate::types::DiscoveryStatus,
    pub suggestions: Vec<crate::types::Candidate>,
    pub expires_in: u64,
}

/// POST /api/v1/tools/discover/{session_id}/confirm request body.
#[derive(Clone, Debug, Deserialize)]
pub struct ConfirmDiscoveryRequest {
    pub selected_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}
