use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use toolgate_common::ids::ToolId;
use toolgate_common::types::HealthSnapshot;

/// Health Service. Single-flight: concurrent `check`
/// calls for the same tool collapse onto the same `tokio::sync::Mutex`
/// guard, so only one probe is ever in flight per tool; the outer table
/// lock (`std::sync::Mutex`) is only ever held long enough to fetch or
/// insert that per-tool lock, never across an await.
pub struct HealthService {
    per_tool: Mutex<HashMap<ToolId, Arc<tokio::sync::Mutex<Entry>>>>,
    http: reqwest::Client,
    cache_ttl: Duration,
    stale_after: Duration,
    probe_timeout: Duration,
    default_path: String,
}

struct Entry {
    snapshot: Option<HealthSnapshot>,
    checked_at: Option<Instant>,
}

pub struct ProbeTarget<'a> {
    pub tool_id: ToolId,
    pub base_url: &'a str,
    pub health_path: Option<&'a str>,
}

impl HealthService {
    pub fn new(
        http: reqwest::Client,
        cache_ttl: Duration,
        stale_after: Duration,
        probe_timeout: Duration,
        default_path: String,
    ) -> Self {
        Self {
            per_tool: Mutex::new(HashMap::new()),
            http,
            cache_ttl,
            stale_after,
            probe_timeout,
            default_path,
        }
    }

    fn lock_for(&self, tool_id: ToolId) -> Arc<tokio::sync::Mutex<Entry>> {
        let mut table = self.per_tool.lock().expect("health table lock poisoned");
        Arc::clone(table.entry(tool_id).or_insert_with(|| {
            Arc::new(tokio::sync::Mutex::new(Entry {
                snapshot: None,
                checked_at: None,
            }))
        }))
    }

    /// `check(tool) → HealthSnapshot`. `force` bypasses the TTL cache —
    /// the `test` endpoint always passes `force=true`.
    pub async fn check(&self, target: ProbeTarget<'_>, force: bool) -> HealthSnapshot {
        let lock = self.lock_for(target.tool_id);
        let mut entry = lock.lock().await;

        if !force {
            if let (Some(snapshot), Some(checked_at)) = (&entry.snapshot, entry.checked_at) {
                if checked_at.elapsed() < self.cache_ttl {
                    metrics::counter!("toolgate.health.cache_hit").increment(1);
                    let mut cached = snapshot.clone();
                    cached.was_cached = true;
                    return cached;
                }
            }
        }

        metrics::counter!("toolgate.health.probe").increment(1);
        let snapshot = self.probe(&target).await;
        entry.snapshot = Some(snapshot.clone());
        entry.checked_at = Some(Instant::now());
        snapshot
    }

    /// Non-blocking read of the cached snapshot — the Execution Engine
    /// only ever consults this, it never probes inline.
    pub fn cached(&self, tool_id: ToolId) -> Option<HealthSnapshot> {
        let table = self.per_tool.lock().expect("health table lock poisoned");
        let lock = table.get(&tool_id)?;
        let entry = lock.try_lock().ok()?;
        let snapshot = entry.snapshot.clone()?;
        let checked_at = entry.checked_at?;
        if checked_at.elapsed() >= self.stale_after {
            return None;
        }
        Some(snapshot)
    }

    /// Request an async refresh without blocking the caller. The
    /// Execution Engine uses this after a stale cache hit so the next
    /// call sees a fresh snapshot, without holding up the current one.
    pub fn spawn_refresh(self: &Arc<Self>, tool_id: ToolId, base_url: String, health_path: Option<String>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.check(
                ProbeTarget {
                    tool_id,
                    base_url: &base_url,
                    health_path: health_path.as_deref(),
                },
                true,
            )
            .await;
        });
    }

    async fn probe(&self, target: &ProbeTarget<'_>) -> HealthSnapshot {
        let path = target.health_path.unwrap_or(&self.default_path);
        let url = format!("{}{}", target.base_url.trim_end_matches('/'), path);
        let start = Instant::now();

        let result = self
            .http
            .head(&url)
            .timeout(self.probe_timeout)
            .send()
            .await;

        let result = match result {
            Ok(resp) if resp.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED => {
                self.http.get(&url).timeout(self.probe_timeout).send().await
            }
            other => other,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) if resp.status().is_success() => HealthSnapshot {
                is_healthy: true,
                last_checked: chrono::Utc::now(),
                response_time_ms: elapsed_ms,
                error: None,
                version: resp
                    .headers()
                    .get("server")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
                was_cached: false,
            },
            Ok(resp) => HealthSnapshot {
                is_healthy: false,
                last_checked: chrono::Utc::now(),
                response_time_ms: elapsed_ms,
                error: Some(format!("non-2xx status: {}", resp.status())),
                version: None,
                was_cached: false,
            },
            Err(e) => HealthSnapshot {
                is_healthy: false,
                last_checked: chrono::Utc::now(),
                response_time_ms: elapsed_ms,
                error: Some(e.to_string()),
                version: None,
                was_cached: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> HealthService {
        HealthService::new(
            reqwest::Client::new(),
            Duration::from_secs(300),
            Duration::from_secs(600),
            Duration::from_secs(5),
            "/".to_string(),
        )
    }

    #[test]
    fn cached_returns_none_before_first_probe() {
        let service = service();
        assert!(service.cached(ToolId::new()).is_none());
    }
}
