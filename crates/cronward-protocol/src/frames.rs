use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport-level error codes carried in [`ErrorShape::code`].
pub mod codes {
    /// Frame is not JSON, has no `type`, or is not a request.
    pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";
    pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
    /// Params missing or of the wrong shape for the method.
    pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
    /// The connection has not passed `check_auth`, or acts for someone else.
    pub const AUTH_REQUIRED: &str = "AUTH_REQUIRED";
}

/// A control call from a client.
///
/// Wire: `{ "type": "req", "id": "7", "method": "enable_job", "params": {"name": "backup", "user": "alice"} }`
///
/// `id` is chosen by the client and echoed in the response; `params` is one of
/// the structs in [`crate::params`], absent for `show_jobs` and `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReqFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl ReqFrame {
    /// Build a request, serializing typed `params` into the frame.
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: impl Serialize) -> Self {
        Self {
            frame_type: "req".to_string(),
            id: id.into(),
            method: method.into(),
            params: Some(serde_json::to_value(params).unwrap_or(Value::Null)),
        }
    }
}

/// The daemon's answer to one [`ReqFrame`], always carrying the request's `id`.
///
/// Wire: `{ "type": "res", "id": "7", "ok": true, "payload": {"success": true, "message": "Job: 'backup' has been re-enabled"}}`
///
/// `ok` only says whether the call reached its method: a job operation the
/// daemon refused is still `ok: true`, with `success: false` in the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResFrame {
    /// A call that reached its method. `payload` is a
    /// [`CallResult`](crate::results::CallResult) for job and scheduler
    /// operations, a [`JobListing`](crate::results::JobListing) for
    /// `show_jobs`, or a [`Pong`](crate::results::Pong) for `ping`.
    pub fn ok(id: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            frame_type: "res".to_string(),
            id: id.into(),
            ok: true,
            payload: Some(serde_json::to_value(payload).unwrap_or(Value::Null)),
            error: None,
        }
    }

    /// A transport fault; `code` is one of [`codes`].
    pub fn err(id: impl Into<String>, code: &str, message: &str) -> Self {
        Self {
            frame_type: "res".to_string(),
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// Body of an `ok: false` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

/// Whatever arrived on the control socket, parsed only as far as `type`.
///
/// Lets the gateway tell a malformed request (answered with
/// `PROTOCOL_ERROR` under its own `id`) from text that is not JSON at all.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl InboundFrame {
    /// Try to interpret this frame as a client request.
    pub fn as_req(&self) -> Option<ReqFrame> {
        if self.frame_type != "req" {
            return None;
        }
        let mut map = self.rest.clone();
        map.insert("type".to_string(), Value::String("req".to_string()));
        serde_json::from_value(Value::Object(map)).ok()
    }

    /// The `id` field, if present, so even a malformed request can be answered.
    pub fn id(&self) -> Option<&str> {
        self.rest.get("id").and_then(Value::as_str)
    }
}
