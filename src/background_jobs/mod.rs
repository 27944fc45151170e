//! Background job scheduling and execution.
//!
//! Runs periodic and startup-triggered maintenance such as library scans
//! and session cleanup.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::JobScheduler;
