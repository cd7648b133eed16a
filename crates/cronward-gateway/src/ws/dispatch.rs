use cronward_protocol::frames::{codes, ResFrame};
use cronward_protocol::methods;
use serde_json::Value;

use crate::app::AppState;
use crate::ws::handlers;

/// Route a WS method call to the correct handler in `ws/handlers.rs`.
///
/// Connection state is not consulted here; `check_auth` answers the same
/// way it does through `message::handle`, without authenticating anything.
pub async fn route(method: &str, params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    match method {
        methods::PING => handlers::handle_ping(req_id),
        methods::CHECK_AUTH => handlers::handle_check_auth(params, req_id, app).0,

        methods::ADD_JOB => handlers::handle_add_job(params, req_id, app),
        methods::DISABLE_JOB => handlers::handle_disable_job(params, req_id, app),
        methods::ENABLE_JOB => handlers::handle_enable_job(params, req_id, app),
        methods::REMOVE_JOB => handlers::handle_remove_job(params, req_id, app),
        methods::FORCE_RUN_JOB => handlers::handle_force_run_job(params, req_id, app).await,
        methods::SHOW_JOBS => handlers::handle_show_jobs(req_id, app),

        methods::CHECK_SCHED => handlers::handle_check_sched(req_id, app),
        methods::START_SCHED => handlers::handle_start_sched(params, req_id, app),
        methods::STOP_SCHED => handlers::handle_stop_sched(params, req_id, app),

        _ => ResFrame::err(
            req_id,
            codes::METHOD_NOT_FOUND,
            &format!("unknown method: {method}"),
        ),
    }
}
