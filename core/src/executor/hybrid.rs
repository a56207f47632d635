use async_trait::async_trait;

use crate::action::Action;
use crate::config::ExecutorConfig;
use crate::error::ExecError;
use crate::executor::{ActionExecutor, DistributedExecutor, LocalExecutor};
use crate::graph::ActionGraph;

/// Splits the graph between local and distributed execution.
///
/// Leaf layers (actions nothing unassigned depends on) peel off into a
/// local set until the next layer would reach `max_local_actions`; the
/// remaining trunk goes to the distributed executor. The trunk batch runs
/// to completion first, then the local leaf batch; the two are never
/// interleaved.
pub struct HybridExecutor {
    cfg: ExecutorConfig,
}

impl HybridExecutor {
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self { cfg }
    }

    /// Partition action indices into (local leaves, remote trunk). Total
    /// and disjoint: every action lands in exactly one set.
    pub fn partition(&self, actions: &[Action]) -> Result<(Vec<usize>, Vec<usize>), ExecError> {
        let graph = ActionGraph::build(actions)?;
        Ok(self.partition_graph(&graph))
    }

    fn partition_graph(&self, graph: &ActionGraph) -> (Vec<usize>, Vec<usize>) {
        let mut remaining_dependents: Vec<usize> =
            graph.nodes().iter().map(|n| n.dependents.len()).collect();
        let mut assigned = vec![false; graph.len()];
        let mut local = Vec::new();

        loop {
            let layer: Vec<usize> = (0..graph.len())
                .filter(|&i| !assigned[i] && remaining_dependents[i] == 0)
                .collect();
            if layer.is_empty() {
                break;
            }
            if local.len() + layer.len() >= self.cfg.max_local_actions {
                break;
            }
            for &index in &layer {
                assigned[index] = true;
                for &dep in &graph.node(index).dependencies {
                    remaining_dependents[dep] -= 1;
                }
            }
            local.extend(layer);
        }

        let remote: Vec<usize> = (0..graph.len()).filter(|&i| !assigned[i]).collect();
        (local, remote)
    }
}

/// Mark every action reachable from the remote set along dependent edges.
/// When the trunk batch fails, these must not run locally.
fn blocked_behind(graph: &ActionGraph, remote: &[usize]) -> Vec<bool> {
    let mut blocked = vec![false; graph.len()];
    let mut stack: Vec<usize> = remote.to_vec();
    for &index in remote {
        blocked[index] = true;
    }
    while let Some(index) = stack.pop() {
        for &dependent in &graph.node(index).dependents {
            if !blocked[dependent] {
                blocked[dependent] = true;
                stack.push(dependent);
            }
        }
    }
    blocked
}

#[async_trait]
impl ActionExecutor for HybridExecutor {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn execute(&self, actions: &[Action]) -> Result<bool, ExecError> {
        let graph = ActionGraph::build(actions)?;
        let (local, remote) = self.partition_graph(&graph);
        tracing::info!(
            local = local.len(),
            remote = remote.len(),
            "hybrid split"
        );

        let remote_actions: Vec<Action> = remote.iter().map(|&i| actions[i].clone()).collect();

        let remote_ok = if remote_actions.is_empty() {
            true
        } else {
            DistributedExecutor::new(self.cfg.clone())?
                .execute(&remote_actions)
                .await?
        };

        // A failed trunk batch poisons every local action downstream of it;
        // those must not run even though their prerequisite producers are
        // outside the local subgraph.
        let runnable: Vec<usize> = if remote_ok {
            local
        } else {
            let blocked = blocked_behind(&graph, &remote);
            let runnable: Vec<usize> = local.iter().copied().filter(|&i| !blocked[i]).collect();
            if runnable.len() < local.len() {
                tracing::warn!(
                    skipped = local.len() - runnable.len(),
                    "local actions skipped behind failed remote batch"
                );
            }
            runnable
        };

        let local_actions: Vec<Action> = runnable.iter().map(|&i| actions[i].clone()).collect();
        let local_ok = if local_actions.is_empty() {
            true
        } else {
            LocalExecutor::new(self.cfg.clone())
                .execute(&local_actions)
                .await?
        };

        Ok(remote_ok && local_ok)
    }
}
