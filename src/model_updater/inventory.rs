// model-sync/src/model_updater/inventory.rs

use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::types::{ArtifactDescriptor, MODEL_FILE_EXTENSION};
use crate::error::{Result, SyncError};

/// Names of the artifacts present in `models_directory`: every file ending in
/// `.safetensors`, with that extension stripped. Always read fresh.
///
/// A directory that does not exist yet holds nothing. Any other read error
/// fails the scan.
pub fn scan_local_inventory(models_directory: &Path) -> Result<HashSet<String>> {
    let scan_error = |e: std::io::Error| SyncError::InventoryScanFailed {
        path: models_directory.display().to_string(),
        reason: e.to_string(),
    };

    let entries = match fs::read_dir(models_directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(
                "Model directory {} does not exist yet; treating it as empty",
                models_directory.display()
            );
            return Ok(HashSet::new());
        }
        Err(e) => return Err(scan_error(e)),
    };

    let suffix = format!(".{}", MODEL_FILE_EXTENSION);
    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(scan_error)?;
        if entry.file_type().map_err(scan_error)?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            warn!("Skipping non UTF-8 file name in {}: {:?}", models_directory.display(), file_name);
            continue;
        };
        if let Some(stem) = file_name.strip_suffix(suffix.as_str()) {
            names.insert(stem.to_string());
        }
    }

    debug!("Found {} local models in {}", names.len(), models_directory.display());
    Ok(names)
}

/// Names present remotely but not locally.
pub fn missing_names(remote: &[ArtifactDescriptor], local: &HashSet<String>) -> HashSet<String> {
    remote
        .iter()
        .filter(|descriptor| !local.contains(&descriptor.name))
        .map(|descriptor| descriptor.name.clone())
        .collect()
}
