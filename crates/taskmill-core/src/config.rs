use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 7411;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (taskmill.toml + TASKMILL_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskmillConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// No default — a service without a database path must not start.
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Tuning knobs for the polling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-task polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Maximum candidates fetched per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Maximum commands executing at once. Claimed tasks above this limit
    /// queue for a slot; they are never un-claimed.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Wall-clock limit per command; exceeding it fails the task.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            exec_timeout_secs: default_exec_timeout_secs(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_poll_interval_secs() -> u64 {
    2
}
fn default_batch_size() -> u32 {
    32
}
fn default_max_concurrency() -> usize {
    8
}
fn default_exec_timeout_secs() -> u64 {
    300
}

impl TaskmillConfig {
    /// Load config from a TOML file with TASKMILL_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. TASKMILL_CONFIG env var (handled by the caller)
    ///   3. ./taskmill.toml
    ///
    /// Env keys use `__` as the section separator, e.g.
    /// `TASKMILL_DATABASE__PATH=/var/lib/taskmill/taskmill.db`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("taskmill.toml");

        let config: TaskmillConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("TASKMILL_").split("__"))
            .extract()
            .map_err(|e| crate::error::TaskmillError::Config(e.to_string()))?;

        if config.database.path.trim().is_empty() {
            return Err(crate::error::TaskmillError::Config(
                "database.path must not be empty".to_string(),
            ));
        }

        Ok(config)
    }
}
