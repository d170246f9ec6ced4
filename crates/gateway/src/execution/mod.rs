mod auth;
mod cancellation;
mod engine;
mod http_client;

pub use cancellation::{scoped_key, CancellationRegistry};
pub use engine::{ExecutionEngine, ExecutionOutcome};

use toolgate_common::error::ErrorKind;
use toolgate_common::types::{AttemptRecord, ExecutionRecord};

#[derive(Debug)]
pub enum ExecutionError {
    NotFound(String),
    InvalidParameters(String),
    ToolDisabled,
    ToolUnhealthy,
    RateLimited,
    DeadlineExceeded(ExecutionRecord, Vec<AttemptRecord>),
    Cancelled(ExecutionRecord, Vec<AttemptRecord>),
    Upstream(ErrorKind, ExecutionRecord, Vec<AttemptRecord>),
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::ToolDisabled => ErrorKind::ToolDisabled,
            Self::ToolUnhealthy => ErrorKind::ToolUnhealthy,
            Self::RateLimited => ErrorKind::RateLimitedLocal,
            Self::DeadlineExceeded(..) => ErrorKind::DeadlineExceeded,
            Self::Cancelled(..) => ErrorKind::Cancelled,
            Self::Upstream(kind, ..) => *kind,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::NotFound(name) => format!("action `{name}` not found"),
            Self::InvalidParameters(detail) => detail.clone(),
            Self::ToolDisabled => "tool is disabled".to_string(),
            Self::ToolUnhealthy => "tool is currently unhealthy".to_string(),
            Self::RateLimited => "rate limit exceeded".to_string(),
            Self::DeadlineExceeded(..) => "execution deadline exceeded".to_string(),
            Self::Cancelled(..) => "execution cancelled by caller".to_string(),
            Self::Upstream(kind, ..) => format!("upstream call failed: {}", kind.code()),
        }
    }

    /// Attempt/Execution Records accumulated before the error surfaced,
    /// for the caller to persist via the Audit Ledger regardless of
    /// outcome.
    pub fn into_record(self) -> Option<(ExecutionRecord, Vec<AttemptRecord>)> {
        match self {
            Self::DeadlineExceeded(record, attempts)
            | Self::Cancelled(record, attempts)
            | Self::Upstream(_, record, attempts) => Some((record, attempts)),
            _ => None,
        }
    }
}
