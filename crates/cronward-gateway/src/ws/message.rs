use cronward_protocol::frames::{codes, InboundFrame, ResFrame};
use cronward_protocol::methods::CHECK_AUTH;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::auth;
use crate::ws::connection::ConnState;
use crate::ws::{dispatch, handlers};

/// Process one inbound WS text frame. Returns the new connection state and
/// the response to send back.
pub async fn handle(
    conn_id: &str,
    text: &str,
    state: ConnState,
    app: &AppState,
) -> (ConnState, ResFrame) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id, error = %e, "malformed frame");
            let res = ResFrame::err("", codes::PROTOCOL_ERROR, &format!("malformed frame: {e}"));
            return (state, res);
        }
    };

    let Some(req) = frame.as_req() else {
        warn!(conn_id, frame_type = %frame.frame_type, "not a request frame");
        let res = ResFrame::err(
            frame.id().unwrap_or_default(),
            codes::PROTOCOL_ERROR,
            "expected a request frame",
        );
        return (state, res);
    };

    if let Some(res) = auth::gate(app.config.auth.enforce, &state, &req) {
        warn!(conn_id, method = %req.method, "call rejected by auth gate");
        return (state, res);
    }

    debug!(conn_id, method = %req.method, id = %req.id, "request");

    if req.method == CHECK_AUTH {
        let (res, allowed) = handlers::handle_check_auth(req.params.as_ref(), &req.id, app);
        let next = match allowed {
            Some(user) => {
                info!(conn_id, user = %user, "connection authenticated");
                ConnState::Authenticated { user }
            }
            // A denied check_auth drops any earlier authentication.
            None if res.ok => ConnState::Anonymous,
            None => state,
        };
        return (next, res);
    }

    let res = dispatch::route(&req.method, req.params.as_ref(), &req.id, app).await;
    (state, res)
}
