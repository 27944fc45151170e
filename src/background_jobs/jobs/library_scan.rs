//! Periodic synchronization of the catalog with the music directory.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior},
};
use crate::library::{log_scan_outcome, ScanError};
use std::time::Duration;

pub struct LibraryScanJob {
    interval: Option<Duration>,
    on_startup: bool,
}

impl LibraryScanJob {
    pub fn new(interval: Option<Duration>, on_startup: bool) -> Self {
        Self {
            interval,
            on_startup,
        }
    }

    /// Whether the job would ever run.
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some() || self.on_startup
    }
}

impl BackgroundJob for LibraryScanJob {
    fn id(&self) -> &'static str {
        "library_scan"
    }

    fn name(&self) -> &'static str {
        "Library Scan"
    }

    fn description(&self) -> &'static str {
        "Synchronize the catalog with the audio files in the music directory"
    }

    fn schedule(&self) -> JobSchedule {
        let hooks = if self.on_startup {
            vec![HookEvent::OnStartup]
        } else {
            vec![]
        };
        JobSchedule::Combined {
            interval: self.interval,
            hooks,
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // An interrupted scan leaves the catalog consistent; the next one
        // picks up where it stopped.
        ShutdownBehavior::Cancellable
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let outcome = ctx.library.trigger_scan(&ctx.cancellation_token);
        log_scan_outcome("Scheduled", &outcome);
        match outcome {
            Ok(_) => Ok(()),
            Err(ScanError::Cancelled) => Err(JobError::Cancelled),
            Err(ScanError::AlreadyRunning(_)) => Err(JobError::AlreadyRunning),
            Err(e) => Err(JobError::ExecutionFailed(e.to_string())),
        }
    }
}
