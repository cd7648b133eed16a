//! cronward-sandbox: runs a job's plugin under the job owner's identity.
//!
//! Each execution resolves the owner to a uid/gid pair, re-resolves the
//! plugin from the plugin directory (so on-disk updates take effect on the
//! next run), and spawns it as a child process whose identity is switched to
//! the owner before any plugin code runs. The caller waits for the child to
//! exit; there is no timeout.
//!
//! Plugin contract: an executable file in the plugin directory. It receives
//! the job's kwargs as one JSON object on stdin and the job name in
//! `CRONWARD_JOB`, and signals success with exit status 0.

pub mod error;
pub mod identity;
pub mod output;
pub mod plugin;
pub mod sandbox;

pub use error::{Result, SandboxError};
pub use identity::{Identity, IdentityResolver, StaticIdentities, SystemIdentities};
pub use plugin::{ExecutablePlugin, Plugin, PluginDirectory, PluginLoader};
pub use sandbox::Sandbox;
