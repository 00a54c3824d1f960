//! Trigger gate of the periodic upload job.
//!
//! The external trigger (cron or manual) lands here. A trigger is refused
//! while a run is still in progress, while the trigger is paused, and as
//! long as the dedup cache has not finished loading: running against a
//! half-loaded cache would re-upload artifacts the history already knows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::cache::ProcessedCache;
use crate::config::CronConfig;
use crate::remote::ResultSink;

use super::cancellation::CancellationToken;
use super::coordinator::{SyncCoordinator, SyncRunError};
use super::summary::RunReport;

/// Result of one trigger attempt.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A run executed to completion.
    Completed(RunReport),
    /// Refused: the previous run is still in progress.
    SkippedRunning,
    /// Refused: the dedup cache is not ready.
    SkippedNotReady,
    /// Refused: the trigger is paused.
    SkippedPaused,
}

/// Resets the running flag when the run leaves scope, error paths included.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Gatekeeper between the external trigger and the coordinator.
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    cache: Arc<ProcessedCache>,
    sink: Arc<dyn ResultSink>,
    config: CronConfig,
    running: AtomicBool,
    paused: AtomicBool,
}

impl SyncScheduler {
    /// Creates the scheduler; honors `start_paused`.
    #[must_use]
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        cache: Arc<ProcessedCache>,
        sink: Arc<dyn ResultSink>,
        config: CronConfig,
    ) -> Self {
        let paused = config.start_paused;
        if paused {
            warn!("upload job starts paused");
        }
        Self {
            coordinator,
            cache,
            sink,
            config,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(paused),
        }
    }

    /// Attempts to run the upload job once.
    ///
    /// The discovery window starts at the cursor of the last finished run,
    /// or at the epoch when no run ever finished.
    pub async fn try_trigger(
        &self,
        token: &CancellationToken,
    ) -> Result<TriggerOutcome, SyncRunError> {
        if self.paused.load(Ordering::SeqCst) {
            info!("upload job is paused, skipping execution");
            return Ok(TriggerOutcome::SkippedPaused);
        }
        if !self.cache.is_ready() {
            warn!("processed cache not initialized yet, skipping execution");
            return Ok(TriggerOutcome::SkippedNotReady);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("upload job is taking too long, skipping execution");
            return Ok(TriggerOutcome::SkippedRunning);
        }
        let _guard = RunningGuard(&self.running);

        info!("starting an upload job");
        let since = self
            .sink
            .last_processed_cursor()
            .await?
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let report = self
            .coordinator
            .process_builds(since, self.config.job_size, self.config.batch_size, token)
            .await?;
        info!(run = %report.run_id, "upload job finished");
        Ok(TriggerOutcome::Completed(report))
    }

    /// True while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True while the trigger is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Pauses the trigger.
    pub fn pause(&self) {
        warn!("next execution of the upload job was paused");
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes the trigger.
    pub fn resume(&self) {
        warn!("upload job was resumed");
        self.paused.store(false, Ordering::SeqCst);
    }
}
