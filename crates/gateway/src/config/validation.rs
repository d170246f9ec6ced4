use toolgate_common::config::RetryConfig;

use super::loader::{ConfigError, GatewayConfig};

/// Validate the complete gateway configuration. Refuses to start on
/// out-of-range values (zero attempts, `initial > max` delay, a
/// threshold outside `[0,1]`, ...) rather than silently clamping them.
pub fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_security(config, &mut errors);
    validate_discovery(config, &mut errors);
    validate_health(config, &mut errors);
    validate_retry(&config.system.retry.execution, "execution", &mut errors);
    validate_retry(&config.system.retry.internal, "internal", &mut errors);
    validate_rate_limit(config, &mut errors);
    validate_cache(config, &mut errors);
    validate_vault(config, &mut errors);
    validate_execution(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.join("; ")))
    }
}

fn validate_security(config: &GatewayConfig, errors: &mut Vec<String>) {
    let s = &config.system.security;
    if s.max_redirects == 0 {
        errors.push("security.max_redirects must be > 0".into());
    }
    if s.max_spec_bytes == 0 {
        errors.push("security.max_spec_bytes must be > 0".into());
    }
    if s.dns_timeout_ms == 0 {
        errors.push("security.dns_timeout_ms must be > 0".into());
    }
}

fn validate_discovery(config: &GatewayConfig, errors: &mut Vec<String>) {
    let d = &config.system.discovery;
    if d.max_concurrent_probes == 0 {
        errors.push("discovery.max_concurrent_probes must be > 0".into());
    }
    if d.probe_timeout_ms == 0 {
        errors.push("discovery.probe_timeout_ms must be > 0".into());
    }
    if d.session_ttl_seconds == 0 {
        errors.push("discovery.session_ttl_seconds must be > 0".into());
    }
}

fn validate_health(config: &GatewayConfig, errors: &mut Vec<String>) {
    let h = &config.system.health;
    if h.stale_after_seconds < h.cache_ttl_seconds {
        errors.push("health.stale_after_seconds must be >= health.cache_ttl_seconds".into());
    }
    if h.probe_timeout_ms == 0 {
        errors.push("health.probe_timeout_ms must be > 0".into());
    }
    if h.default_path.is_empty() {
        errors.push("health.default_path must not be empty".into());
    }
}

fn validate_retry(rc: &RetryConfig, name: &str, errors: &mut Vec<String>) {
    if rc.max_attempts == 0 {
        errors.push(format!("retry.{name}.max_attempts must be > 0"));
    }
    if rc.max_delay_ms < rc.initial_delay_ms {
        errors.push(format!(
            "retry.{name}.max_delay_ms must be >= initial_delay_ms"
        ));
    }
    if rc.multiplier < 1.0 {
        errors.push(format!("retry.{name}.multiplier must be >= 1.0"));
    }
    if !(0.0..=1.0).contains(&rc.jitter) {
        errors.push(format!("retry.{name}.jitter must be between 0.0 and 1.0"));
    }
}

fn validate_rate_limit(config: &GatewayConfig, errors: &mut Vec<String>) {
    let r = &config.system.rate_limit;
    if r.tenant_rate <= 0.0 {
        errors.push("rate_limit.tenant_rate must be > 0".into());
    }
    if r.tool_rate <= 0.0 {
        errors.push("rate_limit.tool_rate must be > 0".into());
    }
    if r.max_queue_ms > 1000 {
        errors.push("rate_limit.max_queue_ms must be <= 1000ms".into());
    }
}

fn validate_cache(config: &GatewayConfig, errors: &mut Vec<String>) {
    if config.system.cache.spec_ttl_seconds == 0 {
        errors.push("cache.spec_ttl_seconds must be > 0".into());
    }
}

fn validate_vault(config: &GatewayConfig, errors: &mut Vec<String>) {
    if config.system.vault.master_key_env.is_empty() {
        errors.push("vault.master_key_env must not be empty".into());
    }
}

fn validate_execution(config: &GatewayConfig, errors: &mut Vec<String>) {
    let e = &config.system.execution;
    if e.per_attempt_timeout_ms == 0 {
        errors.push("execution.per_attempt_timeout_ms must be > 0".into());
    }
    if e.deadline_ms < e.per_attempt_timeout_ms {
        errors.push("execution.deadline_ms must be >= execution.per_attempt_timeout_ms".into());
    }
}
