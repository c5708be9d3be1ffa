// model-sync/src/model_updater/model_events.rs

use log::trace;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

use super::types::SyncSummary;

// --- Event Payloads ---

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelDownloadProgressPayload {
    pub model_name: String,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>, // Might not always be available from headers
    pub progress_percentage: f32, // 0.0 to 100.0
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelDownloadCompletePayload {
    pub model_name: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelDownloadFailedPayload {
    pub model_name: String,
    pub error_message: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "camelCase")]
pub enum ModelEvent {
    DownloadProgress(ModelDownloadProgressPayload),
    DownloadComplete(ModelDownloadCompletePayload),
    DownloadFailed(ModelDownloadFailedPayload),
    PassComplete(SyncSummary),
}

/// Fan-out for updater events. Emitting with no subscribers is fine.
#[derive(Clone, Debug)]
pub struct ModelEvents {
    sender: broadcast::Sender<ModelEvent>,
}

impl ModelEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.sender.subscribe()
    }

    fn emit(&self, event: ModelEvent) {
        if self.sender.send(event).is_err() {
            trace!("No subscribers for model event");
        }
    }
}

impl Default for ModelEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

// --- Event Emitter Functions ---

pub fn emit_model_download_progress(events: &ModelEvents, payload: ModelDownloadProgressPayload) {
    events.emit(ModelEvent::DownloadProgress(payload));
}

pub fn emit_model_download_complete(events: &ModelEvents, payload: ModelDownloadCompletePayload) {
    events.emit(ModelEvent::DownloadComplete(payload));
}

pub fn emit_model_download_failed(events: &ModelEvents, payload: ModelDownloadFailedPayload) {
    events.emit(ModelEvent::DownloadFailed(payload));
}

pub fn emit_pass_complete(events: &ModelEvents, summary: SyncSummary) {
    events.emit(ModelEvent::PassComplete(summary));
}
