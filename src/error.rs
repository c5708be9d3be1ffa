//! Error types for model synchronization

use thiserror::Error;

/// Failure kinds surfaced by the updater.
///
/// Catalog and inventory failures abort a whole pass. Artifact failures are
/// recorded against one artifact and the pass moves on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// A catalog source could not be fetched or did not hold a list of valid records
    #[error("failed to fetch catalog from {source_url}: {reason}")]
    CatalogFetchFailed { source_url: String, reason: String },

    /// Named artifact lookup missed
    #[error("model {0} not found in the remote list")]
    ArtifactNotFound(String),

    /// Transfer of a single artifact failed
    #[error("failed to download {name}: {reason}")]
    ArtifactFetchFailed { name: String, reason: String },

    /// The local model directory could not be read
    #[error("failed to scan {path}: {reason}")]
    InventoryScanFailed { path: String, reason: String },

    /// Settings or configuration store I/O
    #[error("configuration error: {0}")]
    Config(String),

    #[error("logging setup error: {0}")]
    Logging(String),
}

impl SyncError {
    pub fn catalog(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CatalogFetchFailed {
            source_url: source_url.into(),
            reason: reason.into(),
        }
    }

    pub fn artifact_fetch(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactFetchFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures that abort a whole reconciliation pass.
    pub fn aborts_pass(&self) -> bool {
        matches!(
            self,
            Self::CatalogFetchFailed { .. } | Self::InventoryScanFailed { .. }
        )
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
