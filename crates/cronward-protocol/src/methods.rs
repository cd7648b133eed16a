// Control protocol method names.

// access
pub const CHECK_AUTH: &str = "check_auth";

// jobs
pub const ADD_JOB: &str = "add_job";
pub const DISABLE_JOB: &str = "disable_job";
pub const ENABLE_JOB: &str = "enable_job";
pub const FORCE_RUN_JOB: &str = "force_run_job";
pub const REMOVE_JOB: &str = "remove_job";
pub const SHOW_JOBS: &str = "show_jobs";

// scheduler
pub const CHECK_SCHED: &str = "check_sched";
pub const START_SCHED: &str = "start_sched";
pub const STOP_SCHED: &str = "stop_sched";

// liveness
pub const PING: &str = "ping";

/// Every method the server routes.
pub const ALL: [&str; 11] = [
    CHECK_AUTH,
    ADD_JOB,
    DISABLE_JOB,
    ENABLE_JOB,
    FORCE_RUN_JOB,
    REMOVE_JOB,
    SHOW_JOBS,
    CHECK_SCHED,
    START_SCHED,
    STOP_SCHED,
    PING,
];
