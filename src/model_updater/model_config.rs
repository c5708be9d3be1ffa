// model-sync/src/model_updater/model_config.rs

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::types::{ArtifactDescriptor, ArtifactKind};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    AlreadyPresent,
}

/// Model and VAE configuration, keyed by artifact name.
///
/// Entries are only ever added. Top-level keys this type does not model are
/// carried through load/save untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    #[serde(default)]
    pub model_configs: BTreeMap<String, Value>,
    #[serde(default)]
    pub vae_configs: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ConfigStore {
    /// Load from `path`; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No configuration store at {}; starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(SyncError::config(format!(
                    "Failed to read configuration store {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let store: Self = serde_json::from_str(&raw).map_err(|e| {
            SyncError::config(format!("Invalid configuration store {}: {}", path.display(), e))
        })?;
        info!(
            "Loaded configuration store {} ({} models, {} VAEs)",
            path.display(),
            store.model_configs.len(),
            store.vae_configs.len()
        );
        Ok(store)
    }

    /// Write to `path` through a temporary file and a rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent_dir) = path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir).map_err(|e| {
                    SyncError::config(format!("Failed to create directory {}: {}", parent_dir.display(), e))
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::config(format!("Failed to serialize configuration store: {}", e)))?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serialized).map_err(|e| {
            SyncError::config(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, path).map_err(|e| {
            fs::remove_file(&temp_path).ok();
            SyncError::config(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;
        debug!("Saved configuration store to {}", path.display());
        Ok(())
    }

    pub fn partition(&self, kind: ArtifactKind) -> &BTreeMap<String, Value> {
        match kind {
            ArtifactKind::Model => &self.model_configs,
            ArtifactKind::VAE => &self.vae_configs,
        }
    }

    fn partition_mut(&mut self, kind: ArtifactKind) -> &mut BTreeMap<String, Value> {
        match kind {
            ArtifactKind::Model => &mut self.model_configs,
            ArtifactKind::VAE => &mut self.vae_configs,
        }
    }

    pub fn contains(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.partition(descriptor.kind).contains_key(&descriptor.name)
    }

    /// Insert the descriptor's record unless its name is already configured.
    /// Existing entries are never replaced, even when the remote record changed.
    pub fn merge_if_absent(&mut self, descriptor: &ArtifactDescriptor) -> MergeOutcome {
        let partition = self.partition_mut(descriptor.kind);
        if partition.contains_key(&descriptor.name) {
            debug!("{} {} already configured", descriptor.kind, descriptor.name);
            return MergeOutcome::AlreadyPresent;
        }
        partition.insert(descriptor.name.clone(), Value::Object(descriptor.record.clone()));
        info!("Added {} {} to configuration", descriptor.kind, descriptor.name);
        MergeOutcome::Inserted
    }
}
