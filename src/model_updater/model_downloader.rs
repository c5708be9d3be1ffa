// model-sync/src/model_updater/model_downloader.rs

use async_trait::async_trait;
use fs2::available_space;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::model_events::{
    emit_model_download_complete, emit_model_download_failed, emit_model_download_progress,
    ModelDownloadCompletePayload, ModelDownloadFailedPayload, ModelDownloadProgressPayload,
    ModelEvents,
};
use super::types::MODEL_FILE_EXTENSION;
use crate::error::{Result, SyncError};
use crate::settings::UpdaterSettings;

const PROGRESS_EMIT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { path: PathBuf, size_bytes: u64 },
    /// The destination existed; nothing was transferred.
    AlreadyPresent(PathBuf),
}

/// Retrieves one artifact into a directory.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Must be a no-op when `destination_dir/file_name` already exists,
    /// whatever its size or content.
    async fn fetch(
        &self,
        destination_dir: &Path,
        url: &str,
        file_name: &str,
        expected_size_bytes: u64,
    ) -> Result<FetchOutcome>;
}

pub struct HttpArtifactFetcher {
    client: reqwest::Client,
    events: ModelEvents,
}

impl HttpArtifactFetcher {
    pub fn new(
        connect_timeout: Duration,
        timeout: Duration,
        user_agent: &str,
        events: ModelEvents,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .timeout(timeout) // Overall request timeout, body included
            .build()
            .map_err(|e| SyncError::config(format!("Failed to build reqwest client: {}", e)))?;
        Ok(Self { client, events })
    }

    pub fn from_settings(settings: &UpdaterSettings, events: ModelEvents) -> Result<Self> {
        Self::new(
            Duration::from_secs(30),
            Duration::from_secs(settings.download_timeout_secs),
            &settings.user_agent,
            events,
        )
    }

    fn fail(&self, model_name: &str, err_msg: String) -> SyncError {
        error!("{}", err_msg);
        emit_model_download_failed(
            &self.events,
            ModelDownloadFailedPayload {
                model_name: model_name.to_string(),
                error_message: err_msg.clone(),
            },
        );
        SyncError::artifact_fetch(model_name, err_msg)
    }

    fn emit_progress(&self, model_name: &str, downloaded: u64, total: Option<u64>) {
        let progress_percentage = match total {
            Some(total) if total > 0 => (downloaded as f32 / total as f32 * 100.0).min(100.0),
            _ => 0.0, // Indeterminate progress if total size is unknown
        };
        emit_model_download_progress(
            &self.events,
            ModelDownloadProgressPayload {
                model_name: model_name.to_string(),
                downloaded_bytes: downloaded,
                total_bytes: total,
                progress_percentage,
            },
        );
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(
        &self,
        destination_dir: &Path,
        url: &str,
        file_name: &str,
        expected_size_bytes: u64,
    ) -> Result<FetchOutcome> {
        let model_name = file_name
            .strip_suffix(&format!(".{}", MODEL_FILE_EXTENSION))
            .unwrap_or(file_name);
        let target_file_path = destination_dir.join(file_name);

        // Never touch an existing file, even a truncated one
        if target_file_path.exists() {
            debug!("Model {} already exists at {}. Skipping download.", model_name, target_file_path.display());
            return Ok(FetchOutcome::AlreadyPresent(target_file_path));
        }

        fs::create_dir_all(destination_dir).await.map_err(|e| {
            self.fail(model_name, format!("Failed to create directory {}: {}", destination_dir.display(), e))
        })?;

        check_disk_space(destination_dir, expected_size_bytes)
            .map_err(|msg| self.fail(model_name, msg))?;

        let temp_download_path = destination_dir.join(format!("{}.tmp", file_name));
        let cleanup = scopeguard::guard(temp_download_path.clone(), |path| {
            if path.exists() {
                debug!("Removing partial download {}", path.display());
                std::fs::remove_file(&path).ok();
            }
        });

        info!("Downloading new model: {} from {}", model_name, url);
        let response = self.client.get(url).send().await.map_err(|e| {
            self.fail(model_name, format!("Failed to send request for model {}: {}", model_name, e))
        })?;

        if !response.status().is_success() {
            return Err(self.fail(
                model_name,
                format!("Download failed for model {}: HTTP Status {}", model_name, response.status()),
            ));
        }

        let total_size = response
            .content_length()
            .or((expected_size_bytes > 0).then_some(expected_size_bytes));
        let mut downloaded_size: u64 = 0;
        let mut stream = response.bytes_stream();

        let mut temp_file = fs::File::create(&temp_download_path).await.map_err(|e| {
            self.fail(
                model_name,
                format!("Failed to create temporary file {}: {}", temp_download_path.display(), e),
            )
        })?;

        let mut last_progress_emit_time = Instant::now();
        while let Some(item_result) = stream.next().await {
            let chunk = item_result.map_err(|e| {
                self.fail(
                    model_name,
                    format!(
                        "Error while downloading chunk for model {}: {}. Downloaded so far: {} bytes.",
                        model_name, e, downloaded_size
                    ),
                )
            })?;
            temp_file.write_all(&chunk).await.map_err(|e| {
                self.fail(
                    model_name,
                    format!("Error writing chunk to temporary file for model {}: {}", model_name, e),
                )
            })?;
            downloaded_size += chunk.len() as u64;

            let now = Instant::now();
            if now.duration_since(last_progress_emit_time) > PROGRESS_EMIT_INTERVAL {
                self.emit_progress(model_name, downloaded_size, total_size);
                last_progress_emit_time = now;
            }
        }
        self.emit_progress(model_name, downloaded_size, total_size);

        temp_file.sync_all().await.map_err(|e| {
            self.fail(
                model_name,
                format!("Failed to sync temporary file {}: {}", temp_download_path.display(), e),
            )
        })?;
        drop(temp_file);

        let file_size = fs::metadata(&temp_download_path)
            .await
            .map_err(|e| {
                self.fail(
                    model_name,
                    format!("Failed to get metadata for {}: {}", temp_download_path.display(), e),
                )
            })?
            .len();

        if file_size == 0 {
            return Err(self.fail(
                model_name,
                format!("Downloaded file for model {} is empty", model_name),
            ));
        }
        if expected_size_bytes > 0 && file_size != expected_size_bytes {
            // size_mb in the catalog is approximate; report, don't reject
            warn!(
                "Downloaded size for model {} is {} bytes, catalog says {} bytes",
                model_name, file_size, expected_size_bytes
            );
        }

        fs::rename(&temp_download_path, &target_file_path).await.map_err(|e| {
            self.fail(
                model_name,
                format!(
                    "Failed to rename {} to {}: {}",
                    temp_download_path.display(),
                    target_file_path.display(),
                    e
                ),
            )
        })?;
        let _ = scopeguard::ScopeGuard::into_inner(cleanup);

        info!("Successfully downloaded model: {} to {}", model_name, target_file_path.display());
        emit_model_download_complete(
            &self.events,
            ModelDownloadCompletePayload {
                model_name: model_name.to_string(),
                file_path: target_file_path.clone(),
                size_bytes: file_size,
            },
        );

        Ok(FetchOutcome::Downloaded {
            path: target_file_path,
            size_bytes: file_size,
        })
    }
}

fn check_disk_space(dir: &Path, required: u64) -> std::result::Result<(), String> {
    if required == 0 {
        return Ok(());
    }
    match available_space(dir) {
        Ok(available) if available < required => Err(format!(
            "Insufficient disk space in {}. Required: {:.2} GB, Available: {:.2} GB.",
            dir.display(),
            required as f64 / (1024.0 * 1024.0 * 1024.0),
            available as f64 / (1024.0 * 1024.0 * 1024.0)
        )),
        Ok(_) => Ok(()),
        Err(e) => {
            warn!("Failed to check disk space at {}: {}", dir.display(), e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_updater::model_events::ModelEvent;
    use crate::model_updater::test_support::{serve, serve_stalled};
    use tempfile::tempdir;

    fn fetcher(events: ModelEvents) -> HttpArtifactFetcher {
        HttpArtifactFetcher::new(Duration::from_secs(5), Duration::from_secs(10), "test", events)
            .unwrap()
    }

    #[tokio::test]
    async fn downloads_into_place() {
        let dir = tempdir().unwrap();
        let url = serve("200 OK", vec![7u8; 2048]).await;
        let events = ModelEvents::default();
        let mut rx = events.subscribe();

        let outcome = fetcher(events)
            .fetch(dir.path(), &url, "m1.safetensors", 2048)
            .await
            .unwrap();

        let target = dir.path().join("m1.safetensors");
        assert_eq!(
            outcome,
            FetchOutcome::Downloaded {
                path: target.clone(),
                size_bytes: 2048
            }
        );
        assert_eq!(std::fs::read(&target).unwrap().len(), 2048);
        assert!(!dir.path().join("m1.safetensors.tmp").exists());

        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            if let ModelEvent::DownloadComplete(payload) = event {
                assert_eq!(payload.model_name, "m1");
                completed = true;
            }
        }
        assert!(completed);
    }

    #[tokio::test]
    async fn existing_file_is_never_refetched() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("m1.safetensors");
        std::fs::write(&target, b"").unwrap();

        // Nothing listens on this port; a request would fail
        let outcome = fetcher(ModelEvents::default())
            .fetch(dir.path(), "http://127.0.0.1:9/m1", "m1.safetensors", 10 * 1024 * 1024)
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::AlreadyPresent(target.clone()));
        assert!(std::fs::read(&target).unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_error_leaves_no_files_behind() {
        let dir = tempdir().unwrap();
        let url = serve("404 Not Found", b"missing".to_vec()).await;

        let err = fetcher(ModelEvents::default())
            .fetch(dir.path(), &url, "m1.safetensors", 0)
            .await
            .unwrap_err();

        match &err {
            SyncError::ArtifactFetchFailed { name, reason } => {
                assert_eq!(name, "m1");
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!dir.path().join("m1.safetensors").exists());
        assert!(!dir.path().join("m1.safetensors.tmp").exists());
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let dir = tempdir().unwrap();
        let url = serve("200 OK", Vec::new()).await;

        let err = fetcher(ModelEvents::default())
            .fetch(dir.path(), &url, "m1.safetensors", 0)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("empty"));
        assert!(!dir.path().join("m1.safetensors").exists());
        assert!(!dir.path().join("m1.safetensors.tmp").exists());
    }

    #[tokio::test]
    async fn stalled_transfer_times_out_and_cleans_up() {
        let dir = tempdir().unwrap();
        let url = serve_stalled(Some(vec![7u8; 1024])).await;
        let fetcher = HttpArtifactFetcher::new(
            Duration::from_secs(1),
            Duration::from_millis(200),
            "test",
            ModelEvents::default(),
        )
        .unwrap();

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.fetch(dir.path(), &url, "m1.safetensors", 4096),
        )
        .await
        .expect("download should time out on its own")
        .unwrap_err();

        assert!(matches!(err, SyncError::ArtifactFetchFailed { ref name, .. } if name == "m1"));
        assert!(!dir.path().join("m1.safetensors").exists());
        assert!(!dir.path().join("m1.safetensors.tmp").exists());
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let dir = tempdir().unwrap();
        let url = serve_stalled(None).await;
        let fetcher = HttpArtifactFetcher::new(
            Duration::from_secs(1),
            Duration::from_millis(200),
            "test",
            ModelEvents::default(),
        )
        .unwrap();

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.fetch(dir.path(), &url, "m1.safetensors", 0),
        )
        .await
        .expect("request should time out on its own")
        .unwrap_err();

        assert!(matches!(err, SyncError::ArtifactFetchFailed { .. }));
        assert!(!dir.path().join("m1.safetensors.tmp").exists());
    }

    #[test]
    fn impossible_space_requirement_fails_the_check() {
        let dir = tempdir().unwrap();
        assert!(check_disk_space(dir.path(), u64::MAX).is_err());
        assert!(check_disk_space(dir.path(), 0).is_ok());
    }
}
