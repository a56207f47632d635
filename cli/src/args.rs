use std::path::PathBuf;

use clap::Parser;
use forgeflow_core::ExecutorChoice;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorArg {
    Auto,
    Local,
    Dist,
    Hybrid,
}

impl From<ExecutorArg> for ExecutorChoice {
    fn from(arg: ExecutorArg) -> Self {
        match arg {
            ExecutorArg::Auto => ExecutorChoice::Auto,
            ExecutorArg::Local => ExecutorChoice::Local,
            ExecutorArg::Dist => ExecutorChoice::Distributed,
            ExecutorArg::Hybrid => ExecutorChoice::Hybrid,
        }
    }
}

/// Execute a manifest of build actions in dependency order.
#[derive(Parser, Debug)]
#[command(name = "forgeflow", version)]
pub struct Args {
    /// JSON manifest: an array of actions with their produced and
    /// prerequisite items.
    #[arg(long, default_value = "actions.json")]
    pub manifest: PathBuf,

    /// Execution strategy. `auto` probes the distributed backend and
    /// picks a fit for the action count.
    #[arg(long, value_enum, default_value_t = ExecutorArg::Auto)]
    pub executor: ExecutorArg,

    /// Stop dispatching new actions after the first failure.
    #[arg(long)]
    pub stop_on_error: bool,

    /// Cap on concurrently running local actions.
    #[arg(long)]
    pub max_procs: Option<usize>,

    /// Distributed-build driver binary.
    #[arg(long)]
    pub driver: Option<PathBuf>,

    /// Log a per-action timing table after the run.
    #[arg(long)]
    pub detailed_stats: bool,

    /// Suppress the progress counter.
    #[arg(long)]
    pub quiet: bool,
}
