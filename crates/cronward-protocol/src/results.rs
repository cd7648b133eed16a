use serde::{Deserialize, Serialize};

/// Outcome of one job or scheduler operation.
/// Wire: `{ "success": false, "message": "Job does not exist.", "code": "NOT_FOUND" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    pub success: bool,
    pub message: String,
    /// Failure kind; absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl CallResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
        }
    }

    pub fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: Some(code.to_string()),
        }
    }
}

/// `show_jobs` payload: header, divider, then one row per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub lines: Vec<String>,
}

/// `ping` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub pong: bool,
    pub version: String,
}
