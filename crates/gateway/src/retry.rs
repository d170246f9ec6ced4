use std::time::Duration;

use rand::Rng;

use toolgate_common::config::RetryConfig;
use toolgate_common::error::ErrorKind;

/// Classification of a single attempt's outcome, fed to `should_retry`.
/// A free function rather than a method on some client type so both the
/// Execution Engine and Discovery Engine's probes can consult the same
/// policy without depending on an HTTP client type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttemptOutcome {
    Success,
    /// Connection reset, DNS failure, TLS handshake failure, socket timeout.
    Network,
    /// HTTP 429 or a provider rate-limit signal; `retry_after` honors an
    /// upstream `Retry-After` header when present.
    RateLimited { retry_after: Option<Duration> },
    ServerError,
    /// 4xx other than 408/425/429.
    ClientError,
    /// 401/403 — never retried, surfaced for credential refresh.
    AuthError,
    Cancelled,
}

impl AttemptOutcome {
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            Self::Success => None,
            Self::Network => Some(ErrorKind::Network),
            Self::RateLimited { .. } => Some(ErrorKind::RateLimitedUpstream),
            Self::ServerError => Some(ErrorKind::UpstreamError),
            Self::ClientError => Some(ErrorKind::UpstreamClientError),
            Self::AuthError => Some(ErrorKind::AuthError),
            Self::Cancelled => Some(ErrorKind::Cancelled),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryDecision {
    pub retry_after: Duration,
    pub give_up: bool,
}

/// `should_retry(attempt, error) → {retry_after, give_up}`.
/// `attempt` is 1-indexed (the attempt that just completed).
pub fn should_retry(attempt: u32, outcome: AttemptOutcome, policy: &RetryConfig) -> RetryDecision {
    if attempt >= policy.max_attempts {
        return RetryDecision {
            retry_after: Duration::ZERO,
            give_up: true,
        };
    }

    let retryable = match outcome {
        AttemptOutcome::Success => false,
        AttemptOutcome::Network => policy.retry_on_timeout,
        AttemptOutcome::RateLimited { .. } => policy.retry_on_rate_limit,
        AttemptOutcome::ServerError => true,
        AttemptOutcome::ClientError | AttemptOutcome::AuthError | AttemptOutcome::Cancelled => {
            false
        }
    };

    if !retryable {
        return RetryDecision {
            retry_after: Duration::ZERO,
            give_up: true,
        };
    }

    if let AttemptOutcome::RateLimited {
        retry_after: Some(server_value),
    } = outcome
    {
        let max_delay = Duration::from_millis(policy.max_delay_ms);
        return RetryDecision {
            retry_after: server_value.min(max_delay),
            give_up: false,
        };
    }

    RetryDecision {
        retry_after: backoff_delay(attempt, policy),
        give_up: false,
    }
}

/// `delay_i = min(max_delay, initial_delay * multiplier^(i-1)) * (1 +
/// U[-jitter, +jitter])`, clamped at zero.
fn backoff_delay(attempt: u32, policy: &RetryConfig) -> Duration {
    let base = (policy.initial_delay_ms as f64) * policy.multiplier.powi((attempt - 1) as i32);
    let capped = base.min(policy.max_delay_ms as f64);

    let jitter_factor = if policy.jitter > 0.0 {
        rand::thread_rng().gen_range(-policy.jitter..=policy.jitter)
    } else {
        0.0
    };

    let jittered = (capped * (1.0 + jitter_factor)).max(0.0);
    Duration::from_millis(jittered.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            jitter: 0.0,
            retry_on_timeout: true,
            retry_on_rate_limit: true,
        }
    }

    #[test]
    fn retries_server_error_with_growing_backoff() {
        let p = policy();
        let d1 = should_retry(1, AttemptOutcome::ServerError, &p);
        assert!(!d1.give_up);
        assert_eq!(d1.retry_after, Duration::from_millis(100));

        let d2 = should_retry(2, AttemptOutcome::ServerError, &p);
        assert!(!d2.give_up);
        assert_eq!(d2.retry_after, Duration::from_millis(200));
    }

    #[test]
    fn never_retries_client_error() {
        let decision = should_retry(1, AttemptOutcome::ClientError, &policy());
        assert!(decision.give_up);
    }

    #[test]
    fn never_retries_auth_error() {
        let decision = should_retry(1, AttemptOutcome::AuthError, &policy());
        assert!(decision.give_up);
    }

    #[test]
    fn never_retries_cancelled() {
        let decision = should_retry(1, AttemptOutcome::Cancelled, &policy());
        assert!(decision.give_up);
    }

    #[test]
    fn gives_up_at_max_attempts() {
        let decision = should_retry(3, AttemptOutcome::ServerError, &policy());
        assert!(decision.give_up);
    }

    #[test]
    fn honors_server_retry_after_clamped_to_max_delay() {
        let p = policy();
        let decision = should_retry(
            1,
            AttemptOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            },
            &p,
        );
        assert_eq!(decision.retry_after, Duration::from_millis(1000));
    }

    #[test]
    fn rate_limit_not_retried_when_disabled() {
        let mut p = policy();
        p.retry_on_rate_limit = false;
        let decision = should_retry(
            1,
            AttemptOutcome::RateLimited { retry_after: None },
            &p,
        );
        assert!(decision.give_up);
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let p = policy();
        let decision = should_retry(2, AttemptOutcome::Network, &RetryConfig {
            max_attempts: 10,
            ..p
        });
        assert!(decision.retry_after <= Duration::from_millis(p.max_delay_ms));
    }
}
