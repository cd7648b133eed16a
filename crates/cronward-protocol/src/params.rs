//! Request params, one struct per call shape.

use serde::{Deserialize, Serialize};

/// `check_auth`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckAuthParams {
    pub username: String,
}

/// `add_job`: `path` is a definition file inside the daemon's job directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddJobParams {
    pub path: String,
    pub user: String,
    /// Login name behind `user` (differs under sudo). Logged only.
    #[serde(default)]
    pub real_user: Option<String>,
}

/// `disable_job`, `enable_job`, `force_run_job`, `remove_job`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParams {
    pub name: String,
    pub user: String,
    #[serde(default)]
    pub real_user: Option<String>,
}

/// `start_sched`, `stop_sched`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserParams {
    pub user: String,
}

/// The acting user and the login behind it, with `real_user` defaulting to
/// `user` when the client omits it.
pub fn acting<'a>(user: &'a str, real_user: &'a Option<String>) -> (&'a str, &'a str) {
    (user, real_user.as_deref().unwrap_or(user))
}
