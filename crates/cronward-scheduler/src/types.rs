use chrono::{DateTime, Local};
use cronward_core::Kwargs;
use std::path::PathBuf;

use crate::cron::CronSchedule;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Only seen while a job is being added, before it is enabled or disabled.
    Pending,
    Enabled,
    Disabled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "Pending",
            JobStatus::Enabled => "Enabled",
            JobStatus::Disabled => "Disabled",
        };
        write!(f, "{s}")
    }
}

/// A scheduled job, owned by the store.
#[derive(Debug, Clone)]
pub struct Job {
    /// UUID v4 assigned on insertion; tells apart two jobs that held the same
    /// name at different times.
    pub id: String,
    /// Unique across the store; equals the definition file's stem.
    pub name: String,
    /// Account the job runs as.
    pub owner: String,
    /// Free-form classification, shown in listings only.
    pub job_type: String,
    pub schedule: CronSchedule,
    /// Handed to the plugin. Always carries `owner`.
    pub kwargs: Kwargs,
    pub plugin_name: String,
    pub status: JobStatus,
    /// `None` exactly when the job is disabled.
    pub next_run_time: Option<DateTime<Local>>,
    pub definition_path: PathBuf,
}

impl Job {
    /// Enabled with a run time at or before `now`.
    pub fn is_due(&self, now: &DateTime<Local>) -> bool {
        self.status == JobStatus::Enabled && self.next_run_time.is_some_and(|t| t <= *now)
    }
}
