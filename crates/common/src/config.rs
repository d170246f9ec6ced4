use serde::{Deserialize, Serialize};

/// Top-level system configuration, deserialized from system.toml.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    pub security: SecurityGateConfig,
    pub discovery: DiscoveryConfig,
    pub health: HealthConfig,
    pub retry: RetryDefaults,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub vault: VaultConfig,
    pub execution: ExecutionConfig,
}

/// Security Gate limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityGateConfig {
    /// Allow http:// base URLs. Intended for tests only.
    #[serde(default)]
    pub allow_insecure_http: bool,
    /// Max redirects followed when fetching candidate/spec URLs.
    pub max_redirects: u8,
    /// Max bytes accepted for an OpenAPI document.
    pub max_spec_bytes: u64,
    /// DNS resolution budget in milliseconds.
    pub dns_timeout_ms: u64,
}

/// Discovery Engine parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Max concurrent probes across all strategies.
    pub max_concurrent_probes: u32,
    /// Per-probe fetch budget in milliseconds.
    pub probe_timeout_ms: u64,
    /// Discovery Session time-to-live in seconds.
    pub session_ttl_seconds: u64,
    /// Extra well-known paths to probe, beyond the built-in list.
    #[serde(default)]
    pub extra_well_known_paths: Vec<String>,
}

/// Health Service parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthConfig {
    pub cache_ttl_seconds: u64,
    pub stale_after_seconds: u64,
    pub probe_timeout_ms: u64,
    pub default_path: String,
}

/// Default retry parameters. Per-tool overrides are carried
/// on the Tool row itself; these are the fallback when a tool registers
/// without an explicit retry policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryDefaults {
    pub execution: RetryConfig,
    pub internal: RetryConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
    pub retry_on_timeout: bool,
    pub retry_on_rate_limit: bool,
}

/// Token-bucket rate limit defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Default requests-per-second per tenant.
    pub tenant_rate: f64,
    /// Default requests-per-second per tool.
    pub tool_rate: f64,
    /// Max time to queue for a permit before returning rate_limited_local.
    pub max_queue_ms: u64,
}

/// Cache TTL configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Spec Cache entry TTL in seconds.
    pub spec_ttl_seconds: u64,
}

/// Credential Vault configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Environment variable holding the base64-encoded master key material
    /// from which per-tenant keys are derived.
    pub master_key_env: String,
}

/// Execution Engine timing parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-HTTP-attempt timeout, in milliseconds.
    pub per_attempt_timeout_ms: u64,
    /// Wall-clock budget for an entire execution including retries.
    pub deadline_ms: u64,
}
