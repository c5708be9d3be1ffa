// model-sync/src/model_updater/mod.rs

pub mod catalog;
pub mod inventory;
pub mod model_config;
pub mod model_downloader;
pub mod model_events;
pub mod reconciler;
pub mod scheduler;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key public types and entry points
pub use catalog::{CatalogSource, HttpCatalogClient};
pub use inventory::scan_local_inventory;
pub use model_config::{ConfigStore, MergeOutcome};
pub use model_downloader::{ArtifactFetcher, FetchOutcome, HttpArtifactFetcher};
pub use model_events::{ModelEvent, ModelEvents};
pub use reconciler::Reconciler;
pub use scheduler::{start_scheduled_updates, SchedulerHandle};
pub use types::{ArtifactDescriptor, ArtifactFailure, ArtifactKind, SyncSummary};
