//! `check_auth` allow-list and the per-connection gate in front of every
//! other method.

use cronward_protocol::frames::{codes, ReqFrame, ResFrame};
use cronward_protocol::methods::{CHECK_AUTH, PING};
use cronward_protocol::results::CallResult;

use crate::ws::connection::ConnState;

/// Returns true if `username` is in `valid_users`.
///
/// - Empty list → deny all.
/// - `"*"` entry → allow all.
pub fn is_allowed(valid_users: &[String], username: &str) -> bool {
    if valid_users.is_empty() {
        return false;
    }
    if valid_users.iter().any(|u| u == "*") {
        return true;
    }
    valid_users.iter().any(|u| u == username)
}

/// The `check_auth` answer for `username`.
pub fn check_auth(valid_users: &[String], username: &str) -> CallResult {
    if is_allowed(valid_users, username) {
        CallResult::success(format!("User: {username} is allowed."))
    } else {
        CallResult::failure(
            "UNAUTHORIZED",
            format!("Dear {username}, PERMISSION DENIED."),
        )
    }
}

/// With enforcement on, reject `req` unless the connection has passed
/// `check_auth` and any `user` param names the authenticated user.
/// `ping` and `check_auth` always pass.
pub fn gate(enforce: bool, state: &ConnState, req: &ReqFrame) -> Option<ResFrame> {
    if !enforce || req.method == PING || req.method == CHECK_AUTH {
        return None;
    }

    match state {
        ConnState::Anonymous => Some(ResFrame::err(
            &req.id,
            codes::AUTH_REQUIRED,
            "call check_auth first",
        )),
        ConnState::Authenticated { user } => {
            let claimed = req
                .params
                .as_ref()
                .and_then(|p| p.get("user"))
                .and_then(|v| v.as_str());
            match claimed {
                Some(claimed) if claimed != user => Some(ResFrame::err(
                    &req.id,
                    codes::AUTH_REQUIRED,
                    &format!("connection is authenticated as '{user}', not '{claimed}'"),
                )),
                _ => None,
            }
        }
    }
}
