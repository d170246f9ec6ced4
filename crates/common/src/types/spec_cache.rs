use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached, already-fetched OpenAPI document.
/// `toolgate-fetch` owns the cache; `parsed_spec` is opaque raw text here —
/// parsing into an `ActionCatalogue` is the Action Generator's job, which
/// runs inside `toolgate-gateway` where the `openapiv3` dependency lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpecCacheEntry {
    pub url: String,
    pub spec_hash: String,
    pub raw_spec: String,
    pub content_type: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SpecCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
