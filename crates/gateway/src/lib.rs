pub mod audit;
pub mod catalogue;
pub mod config;
pub mod execution;
pub mod health;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod routes;
pub mod vault;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use audit::AuditStore;
use execution::{CancellationRegistry, ExecutionEngine};
use health::HealthService;
use registry::{SpecClient, ToolRegistry};

/// Shared application state handed to every axum route.
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub execution: Arc<ExecutionEngine>,
    pub audit: Arc<AuditStore>,
    pub health: Arc<HealthService>,
    pub spec_client: Arc<SpecClient>,
    pub metrics_handle: PrometheusHandle,
    pub discovery_session_ttl_seconds: u64,
    pub cancellations: Arc<CancellationRegistry>,
}
