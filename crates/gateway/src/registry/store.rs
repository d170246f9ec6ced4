use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use toolgate_common::ids::{TenantId, ToolId};
use toolgate_common::types::{ActionCatalogue, Tool, ToolStatus};

/// Tool Registry's PostgreSQL-backed store. Tool names are
/// unique per tenant; deletes are tombstones (`deleted_at`), never row
/// removal, so an Execution Record's `tool_id` foreign key always resolves.
pub struct ToolStore {
    pool: PgPool,
}

impl ToolStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        tracing::info!("connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.health_check().await?;
        tracing::info!("PostgreSQL connection established");

        Ok(store)
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        tracing::info!("running PostgreSQL migrations");
        sqlx::migrate!("src/registry/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new tool. Fails with `StoreError::Duplicate` if
    /// `(tenant_id, tool_name)` already has a live row.
    pub async fn register(&self, tool: &Tool) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO tools (id, tenant_id, tool_name, display_name, base_url,
                                documentation_url, openapi_url, config, credential_envelope,
                                auth_kind, retry_policy, status, created_at, updated_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(tool.id.0)
        .bind(tool.tenant_id.0)
        .bind(&tool.tool_name)
        .bind(&tool.display_name)
        .bind(&tool.base_url)
        .bind(&tool.documentation_url)
        .bind(&tool.openapi_url)
        .bind(&tool.config)
        .bind(&tool.credential_envelope)
        .bind(&tool.auth_kind)
        .bind(serde_json::to_value(&tool.retry_policy).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(tool.status.as_db_str())
        .bind(tool.created_at)
        .bind(tool.updated_at)
        .bind(&tool.created_by)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Duplicate(tool.tool_name.clone()))
            }
            Err(e) => Err(StoreError::Query(e.to_string())),
        }
    }

    pub async fn get(&self, tenant_id: TenantId, tool_name: &str) -> Result<Tool, StoreError> {
        let row = sqlx::query_as::<_, ToolRow>(
            r#"
            SELECT id, tenant_id, tool_name, display_name, base_url, documentation_url,
                   openapi_url, config, credential_envelope, auth_kind, retry_policy,
                   status, health, created_at, updated_at, created_by, deleted_at
            FROM tools
            WHERE tenant_id = $1 AND tool_name = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id.0)
        .bind(tool_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(tool_name.to_string()))?;

        row.try_into()
    }

    pub async fn get_by_id(&self, tool_id: ToolId) -> Result<Tool, StoreError> {
        let row = sqlx::query_as::<_, ToolRow>(
            r#"
            SELECT id, tenant_id, tool_name, display_name, base_url, documentation_url,
                   openapi_url, config, credential_envelope, auth_kind, retry_policy,
                   status, health, created_at, updated_at, created_by, deleted_at
            FROM tools
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(tool_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(tool_id.to_string()))?;

        row.try_into()
    }

    pub async fn list(&self, tenant_id: TenantId) -> Result<Vec<Tool>, StoreError> {
        let rows = sqlx::query_as::<_, ToolRow>(
            r#"
            SELECT id, tenant_id, tool_name, display_name, base_url, documentation_url,
                   openapi_url, config, credential_envelope, auth_kind, retry_policy,
                   status, health, created_at, updated_at, created_by, deleted_at
            FROM tools
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY tool_name
            "#,
        )
        .bind(tenant_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update(&self, tool: &Tool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE tools
            SET display_name = $2, base_url = $3, documentation_url = $4, openapi_url = $5,
                config = $6, credential_envelope = $7, auth_kind = $8, retry_policy = $9,
                status = $10, health = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(tool.id.0)
        .bind(&tool.display_name)
        .bind(&tool.base_url)
        .bind(&tool.documentation_url)
        .bind(&tool.openapi_url)
        .bind(&tool.config)
        .bind(&tool.credential_envelope)
        .bind(&tool.auth_kind)
        .bind(serde_json::to_value(&tool.retry_policy).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(tool.status.as_db_str())
        .bind(tool.health.as_ref().map(|h| serde_json::to_value(h).unwrap_or_default()))
        .bind(tool.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    /// Remove a tool row outright. Used only to roll back a `register`
    /// call whose catalogue generation failed after the row was already
    /// inserted — the row was never live, so unlike `soft_delete` there's
    /// no tombstone to preserve for past Execution Records.
    pub async fn hard_delete(&self, tool_id: ToolId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM tools WHERE id = $1")
            .bind(tool_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Tombstone a tool rather than deleting the row — past
    /// Execution Records must keep resolving their `tool_id`.
    pub async fn soft_delete(&self, tenant_id: TenantId, tool_name: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tools
            SET deleted_at = now(), status = 'disabled'
            WHERE tenant_id = $1 AND tool_name = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id.0)
        .bind(tool_name)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(tool_name.to_string()));
        }
        Ok(())
    }

    /// Persist the Action Catalogue generated for a tool's current spec,
    /// keyed by spec hash so a re-fetch of an unchanged spec is a no-op.
    pub async fn save_catalogue(
        &self,
        tool_id: ToolId,
        spec_hash: &str,
        catalogue: &ActionCatalogue,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_value(catalogue)
            .map_err(|e| StoreError::Query(format!("catalogue serialize failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO tool_catalogues (tool_id, spec_hash, catalogue, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (tool_id) DO UPDATE
            SET spec_hash = EXCLUDED.spec_hash, catalogue = EXCLUDED.catalogue, updated_at = now()
            "#,
        )
        .bind(tool_id.0)
        .bind(spec_hash)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    pub async fn load_catalogue(
        &self,
        tool_id: ToolId,
    ) -> Result<Option<(String, ActionCatalogue)>, StoreError> {
        let row: Option<(String, serde_json::Value)> = sqlx::query_as(
            "SELECT spec_hash, catalogue FROM tool_catalogues WHERE tool_id = $1",
        )
        .bind(tool_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some((hash, value)) => {
                let catalogue = serde_json::from_value(value)
                    .map_err(|e| StoreError::Query(format!("corrupt catalogue: {e}")))?;
                Ok(Some((hash, catalogue)))
            }
            None => Ok(None),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ToolRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    tool_name: String,
    display_name: String,
    base_url: String,
    documentation_url: Option<String>,
    openapi_url: Option<String>,
    config: Option<serde_json::Value>,
    credential_envelope: Vec<u8>,
    auth_kind: String,
    retry_policy: serde_json::Value,
    status: String,
    health: Option<serde_json::Value>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    created_by: String,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<ToolRow> for Tool {
    type Error = StoreError;

    fn try_from(row: ToolRow) -> Result<Self, StoreError> {
        let retry_policy = serde_json::from_value(row.retry_policy)
            .map_err(|e| StoreError::Query(format!("corrupt retry_policy: {e}")))?;
        let health = row
            .health
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::Query(format!("corrupt health snapshot: {e}")))?;

        Ok(Tool {
            id: ToolId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            tool_name: row.tool_name,
            display_name: row.display_name,
            base_url: row.base_url,
            documentation_url: row.documentation_url,
            openapi_url: row.openapi_url,
            config: row.config.unwrap_or_default(),
            credential_envelope: row.credential_envelope,
            auth_kind: row.auth_kind,
            retry_policy,
            status: parse_status(&row.status),
            health,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
            deleted_at: row.deleted_at,
        })
    }
}

fn parse_status(s: &str) -> ToolStatus {
    match s {
        "active" => ToolStatus::Active,
        "disabled" => ToolStatus::Disabled,
        "error" => ToolStatus::Error,
        other => {
            tracing::warn!(status = other, "unknown tool status, defaulting to disabled");
            ToolStatus::Disabled
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("PostgreSQL connection error: {0}")]
    Connection(String),
    #[error("PostgreSQL query error: {0}")]
    Query(String),
    #[error("PostgreSQL migration error: {0}")]
    Migration(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate tool name: {0}")]
    Duplicate(String),
}

impl StoreError {
    pub fn kind(&self) -> toolgate_common::error::ErrorKind {
        use toolgate_common::error::ErrorKind;
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Duplicate(_) => ErrorKind::DuplicateName,
            Self::Connection(_) | Self::Query(_) | Self::Migration(_) => {
                ErrorKind::StorageUnavailable
            }
        }
    }
}
