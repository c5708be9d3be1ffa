// model-sync/src/model_updater/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Extension shared by every artifact in the model directory.
pub const MODEL_FILE_EXTENSION: &str = "safetensors";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Model,
    VAE,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::VAE => write!(f, "vae"),
        }
    }
}

/// One remote catalog entry, classified at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub download_url: String,
    pub size_bytes: u64,
    pub kind: ArtifactKind,
    /// The catalog record as received; this is what gets merged into the config.
    pub record: Map<String, Value>,
}

impl ArtifactDescriptor {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, MODEL_FILE_EXTENSION)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactFailure {
    pub model_name: String,
    pub error_message: String,
}

/// Outcome of one reconciliation pass.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub pass_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub evaluated: usize,
    pub fetched: usize,
    pub merged: usize,
    pub failures: Vec<ArtifactFailure>,
}

impl SyncSummary {
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            pass_id: Uuid::new_v4().to_string(),
            started_at: now,
            finished_at: now,
            evaluated: 0,
            fetched: 0,
            merged: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, model_name: &str, error_message: String) {
        self.failures.push(ArtifactFailure {
            model_name: model_name.to_string(),
            error_message,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    pub fn is_noop(&self) -> bool {
        self.evaluated == 0 && self.failures.is_empty()
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return write!(f, "No model updates required.");
        }
        write!(
            f,
            "Model updates completed: evaluated={}, fetched={}, merged={}, failed={}",
            self.evaluated,
            self.fetched,
            self.merged,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.model_name, failure.error_message)?;
        }
        Ok(())
    }
}
