//! Error types for the cronward-sandbox crate.

use thiserror::Error;

/// Everything that can go wrong between "run this job" and the child's exit.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The owner has no account on this host.
    #[error("User: '{owner}' does not exist on system")]
    UnknownOwner { owner: String },

    /// No plugin file with that name in the plugin directory.
    #[error("Plugin '{name}' does not exist: {path}")]
    PluginNotFound { name: String, path: String },

    /// Spawn failure, identity switch failure, or non-zero exit.
    #[error("Plugin execution failed: {0}")]
    PluginExecution(String),
}

impl SandboxError {
    pub fn code(&self) -> &'static str {
        match self {
            SandboxError::UnknownOwner { .. } => "UNKNOWN_OWNER",
            SandboxError::PluginNotFound { .. } => "PLUGIN_NOT_FOUND",
            SandboxError::PluginExecution(_) => "PLUGIN_EXECUTION",
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SandboxError>;
