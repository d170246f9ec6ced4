mod sessions;
mod spec_client;
mod store;

pub use sessions::{pending_candidates, SessionStore};
pub use spec_client::{SpecClient, SpecClientError};
pub use store::{StoreError, ToolStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use toolgate_common::config::RetryDefaults;
use toolgate_common::error::ErrorKind;
use toolgate_common::ids::TenantId;
use toolgate_common::types::{
    ActionCatalogue, AuthConfig, ResolvedTool, RetryPolicy, Tool, ToolStatus,
};

use crate::catalogue::{self, CatalogueError};
use crate::vault::{CredentialVault, VaultError};

/// A fetched spec ready to be turned into an Action Catalogue — produced
/// either by an immediate `openapi_url` hint at registration, or by a
/// confirmed Discovery Session.
pub struct RawSpec {
    pub hash: String,
    pub text: String,
}

/// Tool Registry: owns the Tool row lifecycle, Action
/// Catalogue cache, and Discovery Session table. Credential encryption is
/// delegated to the Credential Vault; the Registry never sees plaintext
/// outside a single `resolve` call's stack frame.
pub struct ToolRegistry {
    store: ToolStore,
    vault: Arc<CredentialVault>,
    sessions: SessionStore,
    retry_defaults: RetryDefaults,
    register_locks: Mutex<HashMap<(TenantId, String), Arc<tokio::sync::Mutex<()>>>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
    #[error("tool `{0}` has no resolved Action Catalogue yet")]
    CatalogueMissing(String),
    #[error("tool `{0}` is disabled")]
    ToolDisabled(String),
    #[error("invalid status transition")]
    InvalidTransition,
    #[error("base_url is not a valid https URL: {0}")]
    InvalidBaseUrl(String),
    #[error("re-discovery failed: {0}")]
    Rediscovery(#[from] SpecClientError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::Vault(e) => e.kind(),
            Self::Catalogue(e) => e.kind(),
            Self::CatalogueMissing(_) => ErrorKind::NeedsConfirmation,
            Self::ToolDisabled(_) => ErrorKind::ToolDisabled,
            Self::InvalidTransition => ErrorKind::InvalidConfig,
            Self::InvalidBaseUrl(_) => ErrorKind::InvalidUrl,
            Self::Rediscovery(e) => e.kind(),
        }
    }
}

impl ToolRegistry {
    pub fn new(store: ToolStore, vault: Arc<CredentialVault>, retry_defaults: RetryDefaults) -> Self {
        Self {
            store,
            vault,
            sessions: SessionStore::new(),
            retry_defaults,
            register_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn store(&self) -> &ToolStore {
        &self.store
    }

    async fn lock_for(&self, tenant_id: TenantId, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = self.register_locks.lock().expect("register lock table poisoned");
        Arc::clone(
            table
                .entry((tenant_id, name.to_string()))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Register a new tool. `raw_spec` is `None` when the tool is
    /// registered pending Discovery confirmation — its catalogue stays
    /// empty until a later `attach_catalogue` call.
    pub async fn register(
        &self,
        tenant_id: TenantId,
        name: String,
        display_name: String,
        base_url: String,
        documentation_url: Option<String>,
        openapi_url: Option<String>,
        config: serde_json::Value,
        auth_config: AuthConfig,
        retry_policy: Option<RetryPolicy>,
        raw_spec: Option<RawSpec>,
        actor: String,
    ) -> Result<(Tool, ActionCatalogue), RegistryError> {
        toolgate_common::security::validate_scheme_and_literal(&base_url, false)
            .map_err(|_| RegistryError::InvalidBaseUrl(base_url.clone()))?;

        let lock = self.lock_for(tenant_id, &name).await;
        let _guard = lock.lock().await;

        let scheme_tag = auth_config.scheme_tag().to_string();
        let envelope = self.vault.encrypt(tenant_id, &auth_config)?;

        let now = Utc::now();
        let tool = Tool {
            id: toolgate_common::ids::ToolId::new(),
            tenant_id,
            tool_name: name,
            display_name,
            base_url,
            documentation_url,
            openapi_url,
            config,
            credential_envelope: envelope,
            auth_kind: scheme_tag,
            retry_policy: retry_policy.unwrap_or(self.retry_defaults.execution),
            status: ToolStatus::Active,
            health: None,
            created_at: now,
            updated_at: now,
            created_by: actor,
            deleted_at: None,
        };

        self.store.register(&tool).await?;

        let catalogue = match raw_spec {
            Some(spec) => match self.generate_and_save_catalogue(&tool, &spec).await {
                Ok(catalogue) => catalogue,
                Err(e) => {
                    if let Err(rollback_err) = self.store.hard_delete(tool.id).await {
                        tracing::error!(
                            error = %rollback_err,
                            tool_id = %tool.id,
                            "failed to roll back tool row after catalogue generation failure",
                        );
                    }
                    return Err(e);
                }
            },
            None => ActionCatalogue::default(),
        };

        Ok((tool, catalogue))
    }

    async fn generate_and_save_catalogue(
        &self,
        tool: &Tool,
        spec: &RawSpec,
    ) -> Result<ActionCatalogue, RegistryError> {
        let catalogue = catalogue::generate_catalogue(&spec.text)?;
        self.store.save_catalogue(tool.id, &spec.hash, &catalogue).await?;
        Ok(catalogue)
    }

    /// Attach a freshly generated catalogue to an already-registered
    /// tool — used after a Discovery Session is confirmed.
    pub async fn attach_catalogue(
        &self,
        tool_id: toolgate_common::ids::ToolId,
        raw_spec: RawSpec,
    ) -> Result<ActionCatalogue, RegistryError> {
        let catalogue = catalogue::generate_catalogue(&raw_spec.text)?;
        self.store.save_catalogue(tool_id, &raw_spec.hash, &catalogue).await?;
        Ok(catalogue)
    }

    /// Resolve a tool into the frame-scoped snapshot the Execution Engine
    /// needs: decrypted credential + Action Catalogue. The decrypted
    /// credential must not outlive the caller's stack frame.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        tool_name: &str,
    ) -> Result<ResolvedTool, RegistryError> {
        let tool = self.store.get(tenant_id, tool_name).await?;
        if tool.status != ToolStatus::Active {
            return Err(RegistryError::ToolDisabled(tool_name.to_string()));
        }

        let (_, catalogue) = self
            .store
            .load_catalogue(tool.id)
            .await?
            .ok_or_else(|| RegistryError::CatalogueMissing(tool_name.to_string()))?;

        let credential = self.vault.decrypt(tenant_id, &tool.credential_envelope)?.0;

        Ok(ResolvedTool {
            tool,
            catalogue,
            credential,
        })
    }

    pub async fn get(&self, tenant_id: TenantId, tool_name: &str) -> Result<Tool, RegistryError> {
        Ok(self.store.get(tenant_id, tool_name).await?)
    }

    pub async fn list(&self, tenant_id: TenantId) -> Result<Vec<Tool>, RegistryError> {
        Ok(self.store.list(tenant_id).await?)
    }

    pub async fn delete(&self, tenant_id: TenantId, tool_name: &str) -> Result<(), RegistryError> {
        Ok(self.store.soft_delete(tenant_id, tool_name).await?)
    }

    /// Apply a patch. `new_status`, when present, must be a legal
    /// transition from the tool's current status —
    /// `Error` is reachable only by the system, never by a caller.
    ///
    /// A change to `base_url` or `openapi_url` forces re-discovery
    /// through `spec_client` before the patch is persisted, so the
    /// Action Catalogue never drifts from the endpoint the tool now
    /// points at.
    pub async fn update(
        &self,
        tenant_id: TenantId,
        tool_name: &str,
        patch: UpdatePatch,
        spec_client: &SpecClient,
    ) -> Result<Tool, RegistryError> {
        let mut tool = self.store.get(tenant_id, tool_name).await?;
        let needs_rediscovery = patch.base_url.is_some() || patch.openapi_url.is_some();

        if let Some(display_name) = patch.display_name {
            tool.display_name = display_name;
        }
        if let Some(base_url) = patch.base_url {
            toolgate_common::security::validate_scheme_and_literal(&base_url, false)
                .map_err(|_| RegistryError::InvalidBaseUrl(base_url.clone()))?;
            tool.base_url = base_url;
        }
        if let Some(documentation_url) = patch.documentation_url {
            tool.documentation_url = Some(documentation_url);
        }
        if let Some(openapi_url) = patch.openapi_url {
            tool.openapi_url = Some(openapi_url);
        }
        if let Some(auth_config) = patch.auth_config {
            tool.auth_kind = auth_config.scheme_tag().to_string();
            tool.credential_envelope = self.vault.encrypt(tenant_id, &auth_config)?;
        }
        if let Some(config) = patch.config {
            tool.config = config;
        }
        if let Some(retry_policy) = patch.retry_policy {
            tool.retry_policy = retry_policy;
        }
        if let Some(status) = patch.status {
            if !tool.status.can_transition_to(&status) {
                return Err(RegistryError::InvalidTransition);
            }
            tool.status = status;
        }
        tool.updated_at = Utc::now();

        if needs_rediscovery {
            let hints = toolgate_common::api::discovery::DiscoveryHints {
                openapi_url: tool.openapi_url.clone(),
                doc_url: None,
                openapi_paths: Vec::new(),
            };
            let result = spec_client.discover(&tool.base_url, Some(hints)).await?;
            match result.status {
                toolgate_common::types::DiscoveryStatus::Succeeded => {
                    let spec = RawSpec {
                        hash: result.spec_hash.unwrap_or_default(),
                        text: result.spec_text.unwrap_or_default(),
                    };
                    self.generate_and_save_catalogue(&tool, &spec).await?;
                }
                _ => {
                    return Err(RegistryError::CatalogueMissing(tool_name.to_string()));
                }
            }
        }

        self.store.update(&tool).await?;
        Ok(tool)
    }
}

#[derive(Default)]
pub struct UpdatePatch {
    pub display_name: Option<String>,
    pub base_url: Option<String>,
    pub documentation_url: Option<String>,
    pub openapi_url: Option<String>,
    pub auth_config: Option<AuthConfig>,
    pub config: Option<serde_json::Value>,
    pub retry_policy: Option<RetryPolicy>,
    pub status: Option<ToolStatus>,
}
