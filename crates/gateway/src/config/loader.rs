use std::path::{Path, PathBuf};

use toolgate_common::config::SystemConfig;

use super::validation;

/// Complete gateway configuration loaded from the config directory.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub system: SystemConfig,
    #[allow(dead_code)]
    pub config_dir: PathBuf,
}

/// Load `system.toml` from `config_dir` and validate it. The gateway
/// refuses to start on a validation failure.
pub fn load_config(config_dir: &Path) -> Result<GatewayConfig, ConfigError> {
    tracing::info!(config_dir = %config_dir.display(), "loading configuration");

    let system_path = config_dir.join("system.toml");
    let content = std::fs::read_to_string(&system_path).map_err(|e| ConfigError::FileRead {
        path: system_path.clone(),
        source: e,
    })?;

    let system: SystemConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: system_path.clone(),
        detail: e.to_string(),
    })?;

    let config = GatewayConfig {
        system,
        config_dir: config_dir.to_path_buf(),
    };

    validation::validate(&config)?;

    tracing::info!("configuration loaded successfully");
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("validation failed: {0}")]
    Validation(String),
}
