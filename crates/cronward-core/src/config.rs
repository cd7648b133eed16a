use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8770;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_RPC_PATH: &str = "/rpc";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cronward/cronward.toml";
pub const DEFAULT_JOB_DIR: &str = "/etc/cronward/jobs.d";
pub const DEFAULT_PLUGIN_DIR: &str = "/var/lib/cronward/plugins.d";
pub const DEFAULT_TICK_MS: u64 = 1_000;
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024; // one control call per frame

/// Top-level config (cronward.toml + CRONWARD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronwardConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory holding `<job>.conf` definitions. Imported at startup and
    /// the only place `add_job` accepts files from.
    #[serde(default = "default_job_dir")]
    pub job_dir: PathBuf,
    /// Directory holding plugin executables, looked up by `plugin_name`.
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,
    /// When true no plugin is ever spawned; every execution succeeds at once.
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            job_dir: default_job_dir(),
            plugin_dir: default_plugin_dir(),
            test_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Due-scan cadence in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Start the scheduling loop right after the startup import.
    #[serde(default = "bool_true")]
    pub start_on_boot: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            start_on_boot: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// URL path of the control protocol WebSocket endpoint.
    #[serde(default = "default_rpc_path")]
    pub path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            path: DEFAULT_RPC_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Usernames `check_auth` accepts. `"*"` allows everyone; an empty list
    /// allows no one.
    #[serde(default = "default_valid_users")]
    pub valid_users: Vec<String>,
    /// Require a successful `check_auth` on the connection before any other
    /// call, and require later `user` params to name that same user.
    #[serde(default)]
    pub enforce: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            valid_users: default_valid_users(),
            enforce: false,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_rpc_path() -> String {
    DEFAULT_RPC_PATH.to_string()
}
fn default_job_dir() -> PathBuf {
    PathBuf::from(DEFAULT_JOB_DIR)
}
fn default_plugin_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PLUGIN_DIR)
}
fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}
fn default_valid_users() -> Vec<String> {
    vec!["root".to_string()]
}

impl CronwardConfig {
    /// Load config from a TOML file with CRONWARD_* env var overrides.
    ///
    /// Nested keys use a double underscore: `CRONWARD_DAEMON__TEST_MODE=true`.
    /// A missing file is not an error; every key has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);

        let config: CronwardConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CRONWARD_").split("__"))
            .extract()
            .map_err(|e| crate::error::CronwardError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CronwardError;

        if self.scheduler.tick_ms == 0 {
            return Err(CronwardError::Config(
                "scheduler.tick_ms must be greater than zero".to_string(),
            ));
        }
        if !self.gateway.path.starts_with('/') {
            return Err(CronwardError::Config(format!(
                "gateway.path must start with '/': {}",
                self.gateway.path
            )));
        }
        Ok(())
    }
}
