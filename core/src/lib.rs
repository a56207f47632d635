//! forgeflow-core: build-action execution engine.
//!
//! Takes a flat list of build actions (one external process invocation
//! each, with declared input and output files), links them into a DAG via
//! produced-file matching, and runs them with dependency order respected
//! and parallelism bounded. Work can optionally be split between the local
//! machine and an external distributed-build driver.

pub mod action;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod output;
pub mod progress;
pub mod runner;

pub use action::{Action, ActionKind, ActionOutcome};
pub use config::{load_default, ExecutorConfig};
pub use error::{ExecError, GraphError, RunnerError};
pub use executor::{
    execute_actions, select_executor, ActionExecutor, DistributedExecutor, ExecutionSummary,
    ExecutorChoice, HybridExecutor, LocalExecutor,
};
pub use graph::ActionGraph;
pub use runner::{Priority, ProcessRunner};
