use cronward_sandbox::SandboxError;
use thiserror::Error;

/// Errors surfaced by job control and the scheduling loop.
///
/// The `Display` text of every variant is the human-readable message handed
/// back to control clients, so keep it phrased for an operator.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Job does not exist.")]
    NotFound { name: String },

    #[error("Job: {name} already exists.")]
    DuplicateJob { name: String },

    /// Caller is neither the owner nor root (or not root, for scheduler control).
    #[error("{0}")]
    Unauthorized(String),

    /// The requested transition would be a no-op.
    #[error("{0}")]
    AlreadyInState(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Malformed job definition file.
    #[error("{0}")]
    InvalidDefinition(String),

    /// Owner lookup or plugin failure, passed through from the sandbox.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("Scheduler already running.")]
    AlreadyRunning,

    #[error("Scheduler is not running.")]
    NotRunning,

    /// A run of this job is already in flight.
    #[error("Job: '{name}' is already running.")]
    JobBusy { name: String },

    /// A job vanished between lookup and use. Indicates a bug.
    #[error("Internal error: {0}")]
    InternalConsistency(String),
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::NotFound { .. } => "NOT_FOUND",
            SchedulerError::DuplicateJob { .. } => "DUPLICATE_JOB",
            SchedulerError::Unauthorized(_) => "UNAUTHORIZED",
            SchedulerError::AlreadyInState(_) => "ALREADY_IN_STATE",
            SchedulerError::InvalidSchedule(_) => "INVALID_SCHEDULE",
            SchedulerError::InvalidDefinition(_) => "INVALID_DEFINITION",
            SchedulerError::Sandbox(e) => e.code(),
            SchedulerError::AlreadyRunning => "ALREADY_RUNNING",
            SchedulerError::NotRunning => "NOT_RUNNING",
            SchedulerError::JobBusy { .. } => "JOB_BUSY",
            SchedulerError::InternalConsistency(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
