pub use crate::config::RetryConfig as RetryPolicy;

/// Validate a Retry Policy's invariants: all fields
/// non-negative, `initial <= max`, multiplier/jitter in range.
pub fn validate_retry_policy(policy: &RetryPolicy) -> Result<(), String> {
    if policy.max_attempts == 0 {
        return Err("max_attempts must be >= 1".into());
    }
    if policy.max_delay_ms < policy.initial_delay_ms {
        return Err("max_delay must be >= initial_delay".into());
    }
    if policy.multiplier < 1.0 {
        return Err("multiplier must be >= 1.0".into());
    }
    if !(0.0..=1.0).contains(&policy.jitter) {
        return Err("jitter must be within [0, 1]".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            jitter: 0.2,
            retry_on_timeout: true,
            retry_on_rate_limit: true,
        }
    }

    #[test]
    fn accepts_valid_policy() {
        assert!(validate_retry_policy(&base()).is_ok());
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut p = base();
        p.max_attempts = 0;
        assert!(validate_retry_policy(&p).is_err());
    }

    #[test]
    fn rejects_max_below_initial() {
        let mut p = base();
        p.max_delay_ms = 10;
        p.initial_delay_ms = 100;
        assert!(validate_retry_policy(&p).is_err());
    }

    #[test]
    fn rejects_jitter_out_of_range() {
        let mut p = base();
        p.jitter = 1.5;
        assert!(validate_retry_policy(&p).is_err());
    }
}
