// model-sync/src/model_updater/reconciler.rs

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::catalog::{dedup_by_name, CatalogSource, HttpCatalogClient};
use super::inventory::{missing_names, scan_local_inventory};
use super::model_config::{ConfigStore, MergeOutcome};
use super::model_downloader::{ArtifactFetcher, FetchOutcome, HttpArtifactFetcher};
use super::model_events::{emit_pass_complete, ModelEvents};
use super::types::{ArtifactDescriptor, SyncSummary};
use crate::error::{Result, SyncError};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::settings::UpdaterSettings;

/// Diffs the remote catalog against the model directory and drives
/// fetch-if-absent / merge-if-absent for the difference.
///
/// Passes are serialized: the configuration store lock is held for the whole
/// pass, so on-demand calls and the scheduler never interleave.
pub struct Reconciler {
    catalog: Arc<dyn CatalogSource>,
    fetcher: Arc<dyn ArtifactFetcher>,
    models_directory: PathBuf,
    retry: RetryPolicy,
    events: ModelEvents,
    store: Mutex<ConfigStore>,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        fetcher: Arc<dyn ArtifactFetcher>,
        models_directory: PathBuf,
        store: ConfigStore,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            models_directory,
            retry: RetryPolicy::default(),
            events: ModelEvents::default(),
            store: Mutex::new(store),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_events(mut self, events: ModelEvents) -> Self {
        self.events = events;
        self
    }

    /// HTTP catalog client and fetcher wired from settings.
    pub fn from_settings(
        settings: &UpdaterSettings,
        store: ConfigStore,
        events: ModelEvents,
    ) -> Result<Self> {
        let catalog = HttpCatalogClient::from_settings(settings)?;
        let fetcher = HttpArtifactFetcher::from_settings(settings, events.clone())?;
        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(fetcher),
            settings.base_dir.clone(),
            store,
        )
        .with_retry_policy(settings.retry.clone())
        .with_events(events))
    }

    pub fn events(&self) -> &ModelEvents {
        &self.events
    }

    /// One full pass. Catalog and inventory failures abort it before anything
    /// is touched; a failed artifact is recorded and the pass moves on.
    pub async fn synchronize_all(&self) -> Result<SyncSummary> {
        let mut store = self.store.lock().await;
        let mut summary = SyncSummary::start();
        debug!("Starting model update pass {}", summary.pass_id);

        let remote_model_list = self.fetch_remote_model_list().await?;
        let local_model_names = scan_local_inventory(&self.models_directory).map_err(|e| {
            error!("{}. Skipping update.", e);
            e
        })?;

        let missing = missing_names(&remote_model_list, &local_model_names);
        if !missing.is_empty() {
            let mut listed: Vec<_> = missing.iter().map(String::as_str).collect();
            listed.sort_unstable();
            info!("Missing models that require download: {}", listed.join(", "));
        }

        // Present-but-unconfigured artifacts still need their merge
        let pending: Vec<&ArtifactDescriptor> = remote_model_list
            .iter()
            .filter(|descriptor| missing.contains(&descriptor.name) || !store.contains(descriptor))
            .collect();

        for descriptor in pending {
            let fetch_required = missing.contains(&descriptor.name);
            if let Err(e) = self
                .reconcile_artifact(&mut store, descriptor, fetch_required, &mut summary)
                .await
            {
                warn!("Continuing after failure of {}: {}", descriptor.name, e);
            }
        }

        summary.finish();
        info!("{}", summary);
        emit_pass_complete(&self.events, summary.clone());
        Ok(summary)
    }

    /// Make sure one named artifact is downloaded and configured. The local
    /// inventory is not consulted; fetch-if-absent covers that.
    pub async fn synchronize_one(&self, name: &str) -> Result<SyncSummary> {
        let mut store = self.store.lock().await;
        let mut summary = SyncSummary::start();

        let remote_model_list = self.fetch_remote_model_list().await?;
        let Some(descriptor) = remote_model_list.iter().find(|d| d.name == name) else {
            warn!("Model {} not found in the remote list.", name);
            return Err(SyncError::ArtifactNotFound(name.to_string()));
        };

        self.reconcile_artifact(&mut store, descriptor, true, &mut summary)
            .await?;

        summary.finish();
        info!("Model update completed for {}.", descriptor.name);
        emit_pass_complete(&self.events, summary.clone());
        Ok(summary)
    }

    /// Catalog entries with no local file, in catalog order. Nothing is changed.
    pub async fn missing_artifacts(&self) -> Result<Vec<ArtifactDescriptor>> {
        let _store = self.store.lock().await;
        let remote_model_list = self.fetch_remote_model_list().await?;
        let local_model_names = scan_local_inventory(&self.models_directory)?;
        let missing = missing_names(&remote_model_list, &local_model_names);
        Ok(remote_model_list
            .into_iter()
            .filter(|descriptor| missing.contains(&descriptor.name))
            .collect())
    }

    pub async fn config_snapshot(&self) -> ConfigStore {
        self.store.lock().await.clone()
    }

    /// Persist the configuration store. Waits for any running pass.
    pub async fn save_config(&self, path: &Path) -> Result<()> {
        let store = self.store.lock().await;
        store.save(path)
    }

    async fn fetch_remote_model_list(&self) -> Result<Vec<ArtifactDescriptor>> {
        match self.catalog.fetch_catalog().await {
            Ok(remote) => Ok(dedup_by_name(remote)),
            Err(e) => {
                error!("Could not fetch remote model list. Skipping update. ({})", e);
                Err(e)
            }
        }
    }

    async fn reconcile_artifact(
        &self,
        store: &mut ConfigStore,
        descriptor: &ArtifactDescriptor,
        fetch_required: bool,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        summary.evaluated += 1;

        if fetch_required {
            match self.fetch_if_absent(descriptor).await {
                Ok(FetchOutcome::Downloaded { .. }) => summary.fetched += 1,
                Ok(FetchOutcome::AlreadyPresent(path)) => {
                    debug!("{} already present at {}", descriptor.name, path.display());
                }
                Err(e) => {
                    // Config must not point at an artifact that failed to download
                    summary.record_failure(&descriptor.name, e.to_string());
                    return Err(e);
                }
            }
        }

        if store.merge_if_absent(descriptor) == MergeOutcome::Inserted {
            summary.merged += 1;
        }
        Ok(())
    }

    async fn fetch_if_absent(&self, descriptor: &ArtifactDescriptor) -> Result<FetchOutcome> {
        let file_name = descriptor.file_name();
        let operation_name = format!("download of {}", descriptor.name);
        retry_with_backoff(&self.retry, &operation_name, |_| {
            self.fetcher.fetch(
                &self.models_directory,
                &descriptor.download_url,
                &file_name,
                descriptor.size_bytes,
            )
        })
        .await
    }
}
