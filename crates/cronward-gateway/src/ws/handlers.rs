//! Concrete WS method handler functions.
//!
//! Each function extracts its parameters, calls job control or the engine,
//! and returns a `ResFrame`. Operation failures travel inside an `ok` frame
//! as a `CallResult` with `success: false`; only bad params become error
//! frames.

use cronward_protocol::frames::{codes, ResFrame};
use cronward_protocol::params::{acting, AddJobParams, CheckAuthParams, JobParams, UserParams};
use cronward_protocol::results::{CallResult, JobListing, Pong};
use cronward_scheduler::SchedulerError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::app::AppState;
use crate::auth;

fn parse<T: DeserializeOwned>(params: Option<&Value>, req_id: &str) -> Result<T, ResFrame> {
    let value = params
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|e| {
        ResFrame::err(req_id, codes::INVALID_PARAMS, &format!("invalid params: {e}"))
    })
}

/// Wrap a job control outcome into the wire result.
fn outcome(req_id: &str, method: &str, result: cronward_scheduler::Result<String>) -> ResFrame {
    let call = match result {
        Ok(message) => CallResult::success(message),
        Err(e) => {
            if matches!(e, SchedulerError::InternalConsistency(_)) {
                error!(method, "job store lost a job mid-operation");
            } else {
                debug!(method, code = e.code(), "call refused: {e}");
            }
            CallResult::failure(e.code(), e.to_string())
        }
    };
    ResFrame::ok(req_id, call)
}

pub fn handle_ping(req_id: &str) -> ResFrame {
    ResFrame::ok(
        req_id,
        Pong {
            pong: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}

/// Params: `{ "username": string }`. Returns the result and, when allowed,
/// the user the connection is now authenticated as.
pub fn handle_check_auth(
    params: Option<&Value>,
    req_id: &str,
    app: &AppState,
) -> (ResFrame, Option<String>) {
    let p: CheckAuthParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return (res, None),
    };
    let result = auth::check_auth(&app.config.auth.valid_users, &p.username);
    let allowed = result.success.then_some(p.username);
    (ResFrame::ok(req_id, result), allowed)
}

/// Params: `{ "path": string, "user": string, "real_user"?: string }`.
///
/// A relative `path` is taken relative to the job directory.
pub fn handle_add_job(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p: AddJobParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let (user, real_user) = acting(&p.user, &p.real_user);
    let path = app.control.job_dir().join(&p.path);
    outcome(
        req_id,
        "add_job",
        app.control.add_job_file(&path, user, real_user),
    )
}

pub fn handle_disable_job(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p: JobParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let (user, real_user) = acting(&p.user, &p.real_user);
    outcome(
        req_id,
        "disable_job",
        app.control.disable_job(&p.name, user, real_user),
    )
}

pub fn handle_enable_job(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p: JobParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let (user, real_user) = acting(&p.user, &p.real_user);
    outcome(
        req_id,
        "enable_job",
        app.control.enable_job(&p.name, user, real_user),
    )
}

pub fn handle_remove_job(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p: JobParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let (user, real_user) = acting(&p.user, &p.real_user);
    outcome(
        req_id,
        "remove_job",
        app.control.remove_job(&p.name, user, real_user),
    )
}

/// Waits for the plugin to finish before answering.
pub async fn handle_force_run_job(
    params: Option<&Value>,
    req_id: &str,
    app: &AppState,
) -> ResFrame {
    let p: JobParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let (user, real_user) = acting(&p.user, &p.real_user);
    let result = app.control.force_run_job(&p.name, user, real_user).await;
    outcome(req_id, "force_run_job", result)
}

pub fn handle_show_jobs(req_id: &str, app: &AppState) -> ResFrame {
    ResFrame::ok(
        req_id,
        JobListing {
            lines: app.control.show_jobs(),
        },
    )
}

pub fn handle_check_sched(req_id: &str, app: &AppState) -> ResFrame {
    let (running, message) = app.engine.check_sched();
    let result = if running {
        CallResult::success(message)
    } else {
        CallResult {
            success: false,
            message,
            code: None,
        }
    };
    ResFrame::ok(req_id, result)
}

pub fn handle_start_sched(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p: UserParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return res,
    };
    outcome(req_id, "start_sched", app.engine.start(&p.user))
}

pub fn handle_stop_sched(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p: UserParams = match parse(params, req_id) {
        Ok(p) => p,
        Err(res) => return res,
    };
    outcome(req_id, "stop_sched", app.engine.stop(&p.user))
}
