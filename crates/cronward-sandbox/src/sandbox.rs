use cronward_core::config::DaemonConfig;
use cronward_core::Kwargs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identity::{IdentityResolver, SystemIdentities};
use crate::plugin::{PluginDirectory, PluginLoader};

/// Executes plugins on behalf of job owners.
///
/// Shared behind an `Arc` by job control (force-run) and the scheduling loop.
/// Calls for different jobs run concurrently; serializing runs of one job is
/// the caller's business.
pub struct Sandbox {
    loader: Arc<dyn PluginLoader>,
    identities: Arc<dyn IdentityResolver>,
    test_mode: bool,
}

impl Sandbox {
    pub fn new(
        loader: Arc<dyn PluginLoader>,
        identities: Arc<dyn IdentityResolver>,
        test_mode: bool,
    ) -> Self {
        Self {
            loader,
            identities,
            test_mode,
        }
    }

    /// Plugin directory and system accounts, as configured for the daemon.
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(
            Arc::new(PluginDirectory::new(&config.plugin_dir)),
            Arc::new(SystemIdentities),
            config.test_mode,
        )
    }

    pub fn identities(&self) -> &dyn IdentityResolver {
        self.identities.as_ref()
    }

    /// Run `plugin_name` as `owner` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// - `UnknownOwner`: `owner` has no account.
    /// - `PluginNotFound`: no such plugin in the plugin directory.
    /// - `PluginExecution`: the plugin could not start or exited non-zero.
    pub async fn execute(
        &self,
        job_name: &str,
        plugin_name: &str,
        owner: &str,
        kwargs: &Kwargs,
    ) -> Result<()> {
        if self.test_mode {
            info!(job = job_name, "test mode enabled, job finishing without execution");
            return Ok(());
        }

        let identity = self.identities.resolve(owner)?;
        let plugin = self.loader.load(plugin_name)?;

        debug!(
            job = job_name,
            plugin = plugin_name,
            user = %identity.user,
            group = %identity.group,
            "running job"
        );

        let started = Instant::now();
        let result = plugin.execute(&identity, job_name, kwargs).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => info!(job = job_name, elapsed_ms, "job finished"),
            Err(e) => warn!(job = job_name, elapsed_ms, error = %e, "job failed"),
        }
        result
    }
}
