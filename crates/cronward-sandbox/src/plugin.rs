//! Plugin registry: name → runnable plugin, re-resolved on every load.

use async_trait::async_trait;
use cronward_core::Kwargs;
use nix::unistd::geteuid;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SandboxError};
use crate::identity::Identity;
use crate::output;

/// PATH handed to plugins; their environment is otherwise cleared.
const PLUGIN_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Environment variable carrying the job name into the plugin.
pub const JOB_ENV: &str = "CRONWARD_JOB";

/// A unit of job code, invoked once per execution with the job's kwargs.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion as `identity`. Returns once the plugin has finished.
    async fn execute(&self, identity: &Identity, job_name: &str, kwargs: &Kwargs) -> Result<()>;
}

/// Resolves plugin names. Implementations must not cache across calls: a
/// plugin edited on disk is picked up by its next run.
pub trait PluginLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<dyn Plugin>>;
}

/// Loader over a directory of executables, one file per plugin name.
pub struct PluginDirectory {
    dir: PathBuf,
}

impl PluginDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PluginLoader for PluginDirectory {
    fn load(&self, name: &str) -> Result<Arc<dyn Plugin>> {
        let path = self.dir.join(name);
        let not_found = || SandboxError::PluginNotFound {
            name: name.to_string(),
            path: path.display().to_string(),
        };

        // Names are bare file names; anything that could walk out of the
        // plugin directory is treated as absent.
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(not_found());
        }

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                debug!(plugin = name, path = %path.display(), "plugin resolved");
                Ok(Arc::new(ExecutablePlugin::new(name, path)))
            }
            _ => Err(not_found()),
        }
    }
}

/// A plugin backed by an executable file, run as a child process.
pub struct ExecutablePlugin {
    name: String,
    path: PathBuf,
}

impl ExecutablePlugin {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    fn command(&self, identity: &Identity, job_name: &str) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.env_clear()
            .env("HOME", &identity.home)
            .env("USER", &identity.user)
            .env("LOGNAME", &identity.user)
            .env("PATH", PLUGIN_PATH)
            .env(JOB_ENV, job_name)
            .current_dir("/")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // setgid/setuid run in the child between fork and exec, so the switch
        // is complete before the plugin's first instruction. When uid is set
        // from root the supplementary groups are dropped as well.
        if geteuid().as_raw() != identity.uid {
            cmd.gid(identity.gid).uid(identity.uid);
        }
        cmd
    }

    fn failure(&self, job_name: &str, detail: String) -> SandboxError {
        SandboxError::PluginExecution(format!(
            "job '{job_name}', plugin '{}': {detail}",
            self.name
        ))
    }
}

#[async_trait]
impl Plugin for ExecutablePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, identity: &Identity, job_name: &str, kwargs: &Kwargs) -> Result<()> {
        let input = serde_json::to_vec(kwargs)
            .map_err(|e| self.failure(job_name, format!("cannot encode kwargs: {e}")))?;

        let mut child = self
            .command(identity, job_name)
            .spawn()
            .map_err(|e| self.failure(job_name, format!("failed to start as '{}': {e}", identity.user)))?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A plugin that ignores its kwargs may exit before reading them.
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(job = job_name, error = %e, "plugin did not read kwargs");
                }
            }
        };

        // Only the tail of stderr is kept; stdout goes nowhere.
        let stderr = child.stderr.take();
        let tail = async move {
            match stderr {
                Some(stderr) => output::read_tail(stderr, output::STDERR_TAIL_BYTES).await,
                None => Ok(Vec::new()),
            }
        };

        let ((), tail, status) = tokio::join!(feed, tail, child.wait());
        let status = status.map_err(|e| self.failure(job_name, format!("wait failed: {e}")))?;
        let tail = tail.unwrap_or_else(|e| {
            debug!(job = job_name, error = %e, "reading plugin stderr failed");
            Vec::new()
        });

        if status.success() {
            return Ok(());
        }

        let stderr = output::summarize(&tail);
        let detail = if stderr.is_empty() {
            describe(status)
        } else {
            format!("{}: {stderr}", describe(status))
        };
        Err(self.failure(job_name, detail))
    }
}

fn describe(status: ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit status {code}"),
        (None, Some(signal)) => format!("killed by signal {signal}"),
        (None, None) => "abnormal exit".to_string(),
    }
}
