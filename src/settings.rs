// model-sync/src/settings.rs

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;

const DEFAULT_CONFIG_STORE_FILE: &str = "model_configs.json";

fn default_update_interval_seconds() -> u64 {
    60
}

fn default_catalog_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    60 * 30
}

fn default_user_agent() -> String {
    format!("model-sync/{}", env!("CARGO_PKG_VERSION"))
}

/// Updater settings, read from a YAML file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdaterSettings {
    pub base_dir: PathBuf,
    pub model_config_url: String,
    pub vae_config_url: String,
    #[serde(default)]
    pub extra_catalog_urls: Vec<String>,
    #[serde(default)] // Defaults to <base_dir>/model_configs.json
    pub config_store_path: Option<PathBuf>,
    #[serde(default = "default_update_interval_seconds")]
    pub update_interval_seconds: u64,
    #[serde(default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl UpdaterSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!("Failed to read settings {}: {}", path.display(), e))
        })?;
        let settings = Self::from_yaml(&raw)?;
        info!("Loaded updater settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(raw)
            .map_err(|e| SyncError::config(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(SyncError::config("base_dir must not be empty"));
        }
        if self.update_interval_seconds == 0 {
            return Err(SyncError::config(
                "update_interval_seconds must be a positive integer",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::config("retry.max_attempts must be at least 1"));
        }
        if self.catalog_urls().iter().any(|url| url.trim().is_empty()) {
            return Err(SyncError::config("catalog URLs must not be empty"));
        }
        Ok(())
    }

    /// Catalog sources in fetch order: models, VAEs, then any extras.
    pub fn catalog_urls(&self) -> Vec<String> {
        let mut urls = vec![self.model_config_url.clone(), self.vae_config_url.clone()];
        urls.extend(self.extra_catalog_urls.iter().cloned());
        urls
    }

    pub fn config_store_path(&self) -> PathBuf {
        self.config_store_path
            .clone()
            .unwrap_or_else(|| self.base_dir.join(DEFAULT_CONFIG_STORE_FILE))
    }
}
