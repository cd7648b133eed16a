use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The superuser. May administer every job and the scheduler run state.
pub const ROOT_USER: &str = "root";

/// Synthetic identity the startup loader acts as while importing the job
/// directory. Accepted by job addition and by disable (for `enabled=false`
/// definitions), nowhere else.
pub const BOOTSTRAP_USER: &str = "initial_import";

/// Name of the kwargs key that always carries the job owner.
pub const OWNER_KWARG: &str = "owner";

pub fn is_root(user: &str) -> bool {
    user == ROOT_USER
}

/// A single job argument value.
///
/// Wire: plain JSON scalars (`"x"`, `true`, `42`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

/// Arguments handed verbatim to a job's plugin. Ordered so the JSON a plugin
/// receives is stable between runs.
pub type Kwargs = BTreeMap<String, Value>;
