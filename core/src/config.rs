use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the distributed-build driver binary.
pub const DRIVER_ENV: &str = "FORGEFLOW_DIST_DRIVER";

/// Configuration consumed by the executors. Passed explicitly into each
/// executor's constructor; there is no global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Local concurrency cap is `logical_cpus * processor_multiplier`,
    /// clamped by `processor_cap`.
    #[serde(default = "default_processor_multiplier")]
    pub processor_multiplier: f64,

    /// Hard upper bound on local concurrency.
    #[serde(default = "default_processor_cap")]
    pub processor_cap: usize,

    /// When true, a failure suppresses new dispatch; in-flight actions
    /// still run to completion.
    #[serde(default)]
    pub stop_on_error: bool,

    /// Hybrid split: leaf layers accumulate locally until this many
    /// actions. Defaults to the physical core count.
    #[serde(default = "default_max_local_actions")]
    pub max_local_actions: usize,

    /// Re-check interval for the distributed executor's polling fallback.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Log a per-action (kind, duration, tool, description) table after
    /// the run.
    #[serde(default)]
    pub detailed_stats: bool,

    /// Show the textual progress counter.
    #[serde(default = "default_progress")]
    pub progress: bool,

    /// Distributed-build driver binary. Falls back to `FORGEFLOW_DIST_DRIVER`
    /// and then a PATH search for `forgeflow-dist`.
    #[serde(default)]
    pub driver_path: Option<PathBuf>,
}

fn default_processor_multiplier() -> f64 {
    1.0
}

fn default_processor_cap() -> usize {
    usize::MAX
}

fn default_max_local_actions() -> usize {
    num_cpus::get_physical()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_progress() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            processor_multiplier: default_processor_multiplier(),
            processor_cap: default_processor_cap(),
            stop_on_error: false,
            max_local_actions: default_max_local_actions(),
            poll_interval_ms: default_poll_interval_ms(),
            detailed_stats: false,
            progress: default_progress(),
            driver_path: None,
        }
    }
}

impl ExecutorConfig {
    /// Concurrency cap for the local parallel executor, never below 1.
    pub fn local_concurrency(&self) -> usize {
        let scaled = (num_cpus::get() as f64 * self.processor_multiplier).floor() as usize;
        scaled.min(self.processor_cap).max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load configuration: `forgeflow.toml` in the working directory if
/// present, then environment overrides on top.
pub fn load_default() -> anyhow::Result<ExecutorConfig> {
    let local_config = Path::new("forgeflow.toml");

    let mut cfg: ExecutorConfig = if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<ExecutorConfig>(&s)?
    } else {
        ExecutorConfig::default()
    };

    if let Ok(v) = std::env::var(DRIVER_ENV) {
        if !v.trim().is_empty() {
            cfg.driver_path = Some(PathBuf::from(v));
        }
    }
    if let Ok(v) = std::env::var("FORGEFLOW_STOP_ON_ERROR") {
        if !v.trim().is_empty() {
            cfg.stop_on_error = v.eq_ignore_ascii_case("true") || v == "1";
        }
    }
    if let Ok(v) = std::env::var("FORGEFLOW_MAX_PROCS") {
        if let Ok(n) = v.trim().parse::<usize>() {
            cfg.processor_cap = n.max(1);
        }
    }

    Ok(cfg)
}
