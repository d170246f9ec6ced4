use toolgate_common::api::discovery::{DiscoveryHints, StartDiscoveryRequest};
use toolgate_common::types::DiscoveryResult;

/// Thin client to the `toolgate-fetch` sidecar — the only process in the
/// topology allowed to reach a tenant-supplied base URL directly. The
/// gateway never resolves or dials an upstream host itself.
pub struct SpecClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpecClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    pub async fn discover(
        &self,
        base_url: &str,
        hints: Option<DiscoveryHints>,
    ) -> Result<DiscoveryResult, SpecClientError> {
        let response = self
            .http
            .post(format!("{}/discover", self.base_url.trim_end_matches('/')))
            .json(&StartDiscoveryRequest {
                base_url: base_url.to_string(),
                hints,
                name: None,
                display_name: None,
            })
            .send()
            .await
            .map_err(|e| SpecClientError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SpecClientError::Unreachable(format!(
                "fetch service returned {}",
                response.status()
            )));
        }

        response
            .json::<DiscoveryResult>()
            .await
            .map_err(|e| SpecClientError::Unreachable(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpecClientError {
    #[error("fetch service unreachable: {0}")]
    Unreachable(String),
}

impl SpecClientError {
    pub fn kind(&self) -> toolgate_common::error::ErrorKind {
        toolgate_common::error::ErrorKind::StorageUnavailable
    }
}
