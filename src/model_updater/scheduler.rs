// model-sync/src/model_updater/scheduler.rs

use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::reconciler::Reconciler;

/// Handle to a running update loop.
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to exit. A pass already running is allowed to finish.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Model update loop terminated abnormally: {}", e);
        }
    }
}

/// Run `synchronize_all` every `every`, starting immediately, until `token`
/// is cancelled. Passes run inline on the loop task, so they never overlap;
/// a pass that overruns the interval delays the next tick instead of queueing.
/// Intervals below one second are raised to one second.
pub fn start_scheduled_updates(
    reconciler: Arc<Reconciler>,
    every: Duration,
    token: CancellationToken,
) -> SchedulerHandle {
    let every = every.max(Duration::from_secs(1));
    let loop_token = token.clone();
    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Scheduled model updates every {} seconds.", every.as_secs());

        loop {
            tokio::select! {
                biased;
                _ = loop_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // A failed pass is retried on the next tick
            match reconciler.synchronize_all().await {
                Ok(_) => {}
                Err(e) if e.aborts_pass() => {
                    warn!("Model update pass skipped, retrying in {} seconds: {}", every.as_secs(), e)
                }
                Err(e) => error!("Model update pass failed: {}", e),
            }
        }
        info!("Stopped scheduled model updates.");
    });

    SchedulerHandle { token, task }
}
