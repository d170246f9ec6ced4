use serde::{Deserialize, Serialize};

/// Where an `api_key` scheme's credential is carried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// A tool's authentication mechanism, derived from the OpenAPI
/// `securitySchemes` it advertises.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityScheme {
    Bearer,
    Basic,
    ApiKey {
        location: ApiKeyLocation,
        name: String,
        #[serde(default)]
        prefix: Option<String>,
    },
    SignedHeader {
        algorithm: SignedHeaderAlgorithm,
        header_name: String,
        #[serde(default)]
        prefix: Option<String>,
    },
    /// The tool advertises no security requirement.
    None,
}

impl SecurityScheme {
    /// The tag used to match a Tool's stored `auth_kind` against the
    /// schemes its spec advertises.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
            Self::Basic => "basic",
            Self::ApiKey { .. } => "api_key",
            Self::SignedHeader { .. } => "signed_header",
            Self::None => "none",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignedHeaderAlgorithm {
    HmacSha256,
}

/// Plaintext credential material supplied at registration or update time.
/// Never persisted as-is — always passed through the Credential Vault
/// before it touches storage, and never placed in a `Debug`/log context.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        location: ApiKeyLocation,
        name: String,
        token: String,
        #[serde(default)]
        prefix: Option<String>,
    },
    SignedHeader {
        algorithm: SignedHeaderAlgorithm,
        header_name: String,
        #[serde(default)]
        prefix: Option<String>,
        secret: String,
    },
    None,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthConfig({})", self.scheme_tag())
    }
}

impl AuthConfig {
    pub fn scheme_tag(&self) -> &'static str {
        match self {
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
            Self::ApiKey { .. } => "api_key",
            Self::SignedHeader { .. } => "signed_header",
            Self::None => "none",
        }
    }
}
