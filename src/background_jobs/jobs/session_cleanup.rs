use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior},
};
use std::time::Duration;

/// Deletes sessions idle for longer than the session ttl, once a day.
pub struct SessionCleanupJob;

impl BackgroundJob for SessionCleanupJob {
    fn id(&self) -> &'static str {
        "session_cleanup"
    }

    fn name(&self) -> &'static str {
        "Session Cleanup"
    }

    fn description(&self) -> &'static str {
        "Delete expired session tokens"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(Duration::from_secs(24 * 60 * 60))
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::WaitForCompletion
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        ctx.user_manager
            .prune_expired_sessions()
            .map(|_| ())
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))
    }
}
