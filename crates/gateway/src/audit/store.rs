use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use toolgate_common::error::ErrorKind;
use toolgate_common::ids::{ExecutionId, TenantId, ToolId};
use toolgate_common::types::{AttemptRecord, ExecutionRecord, ExecutionStatus};

/// Audit Ledger: append-only. The only mutation path this
/// type exposes is `record` — there is no `update`/`delete`, deliberately,
/// since an Execution Record must outlive the tool it describes.
pub struct AuditStore {
    pool: PgPool,
}

pub struct Page {
    pub records: Vec<ExecutionRecord>,
    pub next_before: Option<chrono::DateTime<chrono::Utc>>,
}

impl AuditStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AuditError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AuditError> {
        sqlx::migrate!("src/audit/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AuditError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Append one Execution Record and its Attempt Records in a single
    /// transaction — a caller never observes a record with a partial
    /// attempt history.
    pub async fn record(
        &self,
        execution: &ExecutionRecord,
        attempts: &[AttemptRecord],
    ) -> Result<(), AuditError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuditError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO executions (execution_id, tool_id, tenant_id, action, parameters,
                                     status, retry_count, error_kind, latency_ms, started_at, actor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(execution.execution_id.0)
        .bind(execution.tool_id.0)
        .bind(execution.tenant_id.0)
        .bind(&execution.action)
        .bind(&execution.parameters)
        .bind(status_db_str(&execution.status))
        .bind(execution.retry_count as i32)
        .bind(execution.error_kind.map(|k| k.code()))
        .bind(execution.latency_ms as i64)
        .bind(execution.started_at)
        .bind(&execution.actor)
        .execute(&mut *tx)
        .await
        .map_err(|e| AuditError::Query(e.to_string()))?;

        for attempt in attempts {
            sqlx::query(
                r#"
                INSERT INTO execution_attempts
                    (execution_id, attempt_index, error_kind, error_message, backoff_before_ms, attempted_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(execution.execution_id.0)
            .bind(attempt.attempt_index as i32)
            .bind(attempt.error_kind.map(|k| k.code()))
            .bind(&attempt.error_message)
            .bind(attempt.backoff_before_ms as i64)
            .bind(attempt.attempted_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuditError::Query(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| AuditError::Query(e.to_string()))?;
        Ok(())
    }

    /// Tenant-scoped, reverse-chronological, bounded-page query
    /// — `before` paginates by `started_at`.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        tool_id: Option<ToolId>,
        page_size: u32,
        before: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Page, AuditError> {
        let page_size = page_size.clamp(1, 200);
        let before = before.unwrap_or_else(chrono::Utc::now);

        let rows = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT execution_id, tool_id, tenant_id, action, parameters, status,
                   retry_count, error_kind, latency_ms, started_at, actor
            FROM executions
            WHERE tenant_id = $1
              AND started_at < $2
              AND ($3::uuid IS NULL OR tool_id = $3)
            ORDER BY started_at DESC
            LIMIT $4
            "#,
        )
        .bind(tenant_id.0)
        .bind(before)
        .bind(tool_id.map(|t| t.0))
        .bind(page_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuditError::Query(e.to_string()))?;

        let next_before = rows.last().map(|r| r.started_at);
        let records = rows.into_iter().map(Into::into).collect();
        Ok(Page { records, next_before })
    }

    pub async fn get(&self, execution_id: ExecutionId) -> Result<ExecutionRecord, AuditError> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT execution_id, tool_id, tenant_id, action, parameters, status,
                   retry_count, error_kind, latency_ms, started_at, actor
            FROM executions
            WHERE execution_id = $1
            "#,
        )
        .bind(execution_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuditError::Query(e.to_string()))?
        .ok_or_else(|| AuditError::NotFound(execution_id.to_string()))?;

        Ok(row.into())
    }
}

fn status_db_str(status: &ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Success => "success",
        ExecutionStatus::Failure => "failure",
        ExecutionStatus::Aborted => "aborted",
    }
}

fn parse_status(s: &str) -> ExecutionStatus {
    match s {
        "success" => ExecutionStatus::Success,
        "aborted" => ExecutionStatus::Aborted,
        _ => ExecutionStatus::Failure,
    }
}

fn parse_error_kind(s: Option<&str>) -> Option<ErrorKind> {
    use ErrorKind::*;
    s.and_then(|code| {
        [
            InvalidUrl, InsecureScheme, InvalidConfig, InvalidParameters, Unauthorized, Forbidden,
            DuplicateName, NotFound, ToolDisabled, NoSpecFound, SpecTooLarge, SpecParseFailed,
            ExternalRefBlocked, NeedsConfirmation, InternalAddressBlocked, CredentialsInvalid,
            AuthError, RateLimitedLocal, RateLimitedUpstream, UpstreamError, UpstreamClientError,
            Network, ToolUnhealthy, DeadlineExceeded, Cancelled, StorageUnavailable,
            VaultUnavailable,
        ]
        .into_iter()
        .find(|k| k.code() == code)
    })
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    execution_id: uuid::Uuid,
    tool_id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    action: String,
    parameters: serde_json::Value,
    status: String,
    retry_count: i32,
    error_kind: Option<String>,
    latency_ms: i64,
    started_at: chrono::DateTime<chrono::Utc>,
    actor: String,
}

impl From<ExecutionRow> for ExecutionRecord {
    fn from(row: ExecutionRow) -> Self {
        Self {
            execution_id: ExecutionId::from_uuid(row.execution_id),
            tool_id: ToolId::from_uuid(row.tool_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            action: row.action,
            parameters: row.parameters,
            status: parse_status(&row.status),
            retry_count: row.retry_count as u32,
            error_kind: parse_error_kind(row.error_kind.as_deref()),
            latency_ms: row.latency_ms as u64,
            started_at: row.started_at,
            actor: row.actor,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("PostgreSQL connection error: {0}")]
    Connection(String),
    #[error("PostgreSQL query error: {0}")]
    Query(String),
    #[error("PostgreSQL migration error: {0}")]
    Migration(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::StorageUnavailable,
        }
    }
}
