//! Executors for the build-action dependency graph.
//!
//! Three strategies share one trait:
//! - [`LocalExecutor`]: concurrent workers bounded by a processor-derived
//!   cap, dependent-count priority, stop-on-error policy.
//! - [`DistributedExecutor`]: successive waves handed to an external
//!   distributed-build driver, with a polling local fallback for
//!   non-eligible actions.
//! - [`HybridExecutor`]: peels leaf layers for local execution and routes
//!   the trunk through the distributed executor.
//!
//! ```text
//! Vec<Action>
//!   -> ActionGraph::build()           (producer map, edges, ready queue)
//!   -> {Local | Distributed | Hybrid}::execute()
//!   -> ProcessRunner::run()           (one child process per action)
//!   -> bool + completion-ordered log stream
//! ```

mod dist;
mod hybrid;
mod local;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::action::Action;
use crate::config::ExecutorConfig;
use crate::error::ExecError;

pub use dist::{DistributedExecutor, DRIVER_BINARY};
pub use hybrid::HybridExecutor;
pub use local::LocalExecutor;

/// Common contract for the three execution strategies. `execute` returns
/// the overall result: `true` iff every action ran and exited zero.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, actions: &[Action]) -> Result<bool, ExecError>;
}

/// Aggregate counters from a local run, for stats output and tests.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    pub total: usize,
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub peak_concurrency: usize,
    pub duration: Duration,
}

/// Requested execution strategy. `Auto` probes the distributed backend
/// and picks the best available fit for the action count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorChoice {
    #[default]
    Auto,
    Local,
    Distributed,
    Hybrid,
}

impl FromStr for ExecutorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "local" => Ok(Self::Local),
            "dist" | "distributed" => Ok(Self::Distributed),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown executor: {other}")),
        }
    }
}

/// Pick an executor. Backend availability is probed once, here; an
/// explicitly requested backend that is unavailable falls back to local
/// with a warning.
pub fn select_executor(
    cfg: &ExecutorConfig,
    choice: ExecutorChoice,
    action_count: usize,
) -> Result<Box<dyn ActionExecutor>, ExecError> {
    let available = DistributedExecutor::is_available(cfg);

    match choice {
        ExecutorChoice::Local => Ok(Box::new(LocalExecutor::new(cfg.clone()))),
        ExecutorChoice::Distributed => {
            if available {
                Ok(Box::new(DistributedExecutor::new(cfg.clone())?))
            } else {
                tracing::warn!("distributed backend unavailable, falling back to local");
                Ok(Box::new(LocalExecutor::new(cfg.clone())))
            }
        }
        ExecutorChoice::Hybrid => {
            if available {
                Ok(Box::new(HybridExecutor::new(cfg.clone())))
            } else {
                tracing::warn!("distributed backend unavailable, falling back to local");
                Ok(Box::new(LocalExecutor::new(cfg.clone())))
            }
        }
        ExecutorChoice::Auto => {
            if available && action_count > cfg.max_local_actions {
                Ok(Box::new(HybridExecutor::new(cfg.clone())))
            } else if available {
                Ok(Box::new(DistributedExecutor::new(cfg.clone())?))
            } else {
                Ok(Box::new(LocalExecutor::new(cfg.clone())))
            }
        }
    }
}

/// Top-level entry point: select an executor and run the action list.
pub async fn execute_actions(
    actions: &[Action],
    cfg: &ExecutorConfig,
    choice: ExecutorChoice,
) -> Result<bool, ExecError> {
    if actions.is_empty() {
        tracing::info!("target is up to date");
        return Ok(true);
    }

    let executor = select_executor(cfg, choice, actions.len())?;
    tracing::info!(executor = executor.name(), actions = actions.len(), "executing actions");
    executor.execute(actions).await
}
