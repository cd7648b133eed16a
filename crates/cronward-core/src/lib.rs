//! `cronward-core`: configuration, shared error type, and the value types
//! that flow between the scheduler, the sandbox, and the control protocol.

pub mod config;
pub mod error;
pub mod types;

pub use config::CronwardConfig;
pub use error::{CronwardError, Result};
pub use types::{Kwargs, Value};
