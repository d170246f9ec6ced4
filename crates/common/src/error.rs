use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat classification of every error the gateway can surface, shared by
/// the Retry Policy (to decide whether to retry) and the HTTP edge (to
/// pick a status code). This is a classification, not a message carrier —
/// component errors carry their own text and map onto one of these kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // Input
    InvalidUrl,
    InsecureScheme,
    InvalidConfig,
    InvalidParameters,

    // Tenancy
    Unauthorized,
    Forbidden,
    DuplicateName,
    NotFound,
    ToolDisabled,

    // Discovery
    NoSpecFound,
    SpecTooLarge,
    SpecParseFailed,
    ExternalRefBlocked,
    NeedsConfirmation,

    // Security
    InternalAddressBlocked,
    CredentialsInvalid,
    AuthError,

    // Execution
    RateLimitedLocal,
    RateLimitedUpstream,
    UpstreamError,
    UpstreamClientError,
    Network,
    ToolUnhealthy,
    DeadlineExceeded,
    Cancelled,

    // Internal
    StorageUnavailable,
    VaultUnavailable,
}

impl ErrorKind {
    /// HTTP status code the edge should map this kind to.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidUrl
            | Self::InsecureScheme
            | Self::InvalidConfig
            | Self::InvalidParameters => 400,
            Self::Unauthorized => 401,
            Self::Forbidden | Self::AuthError => 403,
            Self::NotFound => 404,
            Self::DuplicateName => 409,
            Self::ToolDisabled => 409,
            Self::NoSpecFound
            | Self::SpecParseFailed
            | Self::ExternalRefBlocked
            | Self::SpecTooLarge => 422,
            Self::NeedsConfirmation => 200,
            Self::InternalAddressBlocked => 400,
            Self::CredentialsInvalid => 422,
            Self::RateLimitedLocal | Self::RateLimitedUpstream => 429,
            Self::UpstreamClientError => 502,
            Self::UpstreamError | Self::Network => 502,
            Self::ToolUnhealthy => 503,
            Self::DeadlineExceeded => 504,
            Self::Cancelled => 499,
            Self::StorageUnavailable | Self::VaultUnavailable => 503,
        }
    }

    /// Whether an internal-dependency error warrants the bounded retry
    /// described.
    pub fn is_internal_transient(self) -> bool {
        matches!(self, Self::StorageUnavailable | Self::VaultUnavailable)
    }

    /// The wire `code` string.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::InsecureScheme => "insecure_scheme",
            Self::InvalidConfig => "invalid_config",
            Self::InvalidParameters => "invalid_parameters",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::DuplicateName => "duplicate_name",
            Self::NotFound => "not_found",
            Self::ToolDisabled => "tool_disabled",
            Self::NoSpecFound => "no_spec_found",
            Self::SpecTooLarge => "spec_too_large",
            Self::SpecParseFailed => "spec_parse_failed",
            Self::ExternalRefBlocked => "external_ref_blocked",
            Self::NeedsConfirmation => "needs_confirmation",
            Self::InternalAddressBlocked => "internal_address_blocked",
            Self::CredentialsInvalid => "credentials_invalid",
            Self::AuthError => "auth_error",
            Self::RateLimitedLocal => "rate_limited_local",
            Self::RateLimitedUpstream => "rate_limited_upstream",
            Self::UpstreamError => "upstream_error",
            Self::UpstreamClientError => "upstream_client_error",
            Self::Network => "network",
            Self::ToolUnhealthy => "tool_unhealthy",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
            Self::StorageUnavailable => "storage_unavailable",
            Self::VaultUnavailable => "vault_unavailable",
        }
    }
}

/// Top-level error type for toolgate operations that don't already carry
/// a more specific component error (`VaultError`, `StoreError`, ...).
#[derive(Debug, Error)]
pub enum ToolgateError {
    #[error("{message}")]
    Classified { kind: ErrorKind, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolgateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Classified {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classified { kind, .. } => *kind,
            Self::Serialization(_) => ErrorKind::InvalidConfig,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolgateError>;
