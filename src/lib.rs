//! Keeps a local directory of model artifacts in step with a remote catalog.
//!
//! The [`Reconciler`] diffs the catalog against the directory, downloads what
//! is missing and merges new entries into the [`ConfigStore`]. The scheduler
//! repeats that on a fixed interval until stopped.

pub mod error;
pub mod logging;
pub mod model_updater;
pub mod retry;
pub mod settings;

pub use error::{Result, SyncError};
pub use model_updater::{
    start_scheduled_updates, ConfigStore, ModelEvent, ModelEvents, Reconciler, SchedulerHandle,
    SyncSummary,
};
pub use settings::UpdaterSettings;
