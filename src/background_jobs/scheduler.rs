use super::context::JobContext;
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Upper bound on how long the scheduler sleeps between checks.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for each running job.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,

    /// Next due time of interval jobs.
    next_runs: HashMap<String, Instant>,

    running_handles: HashMap<String, JoinHandle<()>>,

    job_cancel_tokens: HashMap<String, CancellationToken>,

    shutdown_token: CancellationToken,

    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(shutdown_token: CancellationToken, job_context: JobContext) -> Self {
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            shutdown_token,
            job_context,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!(
            "Registering job: {} ({}) - {}",
            job_id,
            job.name(),
            job.description()
        );
        if let Some(interval) = job.schedule().interval() {
            self.next_runs.insert(job_id.clone(), Instant::now() + interval);
        }
        self.jobs.insert(job_id, job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Main scheduler loop. Returns after the shutdown token is cancelled
    /// and running jobs were given a chance to finish.
    pub async fn run(&mut self) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.job_count()
        );

        self.trigger_jobs_for_hook(HookEvent::OnStartup);

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn is_running(&self, job_id: &str) -> bool {
        self.running_handles
            .get(job_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Instant::now();
        self.next_runs
            .values()
            .map(|next_run| next_run.saturating_duration_since(now))
            .min()
            .map_or(IDLE_CHECK_INTERVAL, |d| d.min(IDLE_CHECK_INTERVAL))
    }

    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<String> = self
            .next_runs
            .iter()
            .filter(|(_, next_run)| **next_run <= now)
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in due {
            self.spawn_job(&job_id, "schedule");
        }
    }

    fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let listening: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.schedule().listens_to(event))
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in listening {
            self.spawn_job(&job_id, &format!("hook:{}", event));
        }
    }

    fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = match self.jobs.get(job_id) {
            Some(job) => Arc::clone(job),
            None => {
                error!("Attempted to spawn unknown job: {}", job_id);
                return;
            }
        };

        // Pushed forward even when skipped, so a long run does not queue up
        // back-to-back executions.
        if let Some(interval) = job.schedule().interval() {
            self.next_runs
                .insert(job_id.to_string(), Instant::now() + interval);
        }

        if self.is_running(job_id) {
            debug!("Skipping {} trigger for running job {}", triggered_by, job_id);
            return;
        }

        info!("Starting job: {} (triggered_by: {})", job_id, triggered_by);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = self.job_context.with_token(cancel_token);
        let job_id_owned = job_id.to_string();

        let handle = tokio::spawn(async move {
            let start_time = std::time::Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(Ok(())) => info!(
                    "Job {} completed successfully in {:?}",
                    job_id_owned, elapsed
                ),
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed)
                }
                Ok(Err(e)) => error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e),
                Err(e) => error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e),
            }
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            let behavior = self
                .jobs
                .get(job_id)
                .map(|job| job.shutdown_behavior())
                .unwrap_or_default();
            if behavior == ShutdownBehavior::Cancellable {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                error!("Job {} did not stop within {:?}", job_id, SHUTDOWN_GRACE);
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}
