use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::action::{Action, ActionOutcome};
use crate::config::ExecutorConfig;
use crate::error::{ExecError, RunnerError};
use crate::executor::{ActionExecutor, ExecutionSummary};
use crate::graph::ActionGraph;
use crate::output::{emit_detailed_stats, RunLog};
use crate::progress::ProgressCounter;
use crate::runner::{Priority, ProcessRunner};

/// Runs ready actions concurrently up to a processor-derived cap,
/// releasing dependents as prerequisites complete.
///
/// Among ready actions, those with the most transitive dependents dispatch
/// first to keep the pipeline deep. A failed action never releases its
/// dependents; with `stop_on_error` set, a failure also clears the ready
/// queue while in-flight actions finish.
pub struct LocalExecutor {
    cfg: ExecutorConfig,
}

impl LocalExecutor {
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self { cfg }
    }

    pub async fn execute_with_summary(
        &self,
        actions: &[Action],
    ) -> Result<(bool, ExecutionSummary), ExecError> {
        let start = Instant::now();
        let total = actions.len();
        let cap = self.cfg.local_concurrency();

        let mut graph = ActionGraph::build(actions)?;
        let mut log = RunLog::new(total);
        log.run_start("local");
        let progress = ProgressCounter::new(total, self.cfg.progress);

        let runner = ProcessRunner::new(Priority::BelowNormal);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(usize, Result<ActionOutcome, RunnerError>)>();

        let mut ready = graph.ready();
        let mut running: HashMap<usize, tokio::task::JoinHandle<()>> = HashMap::new();
        let mut outcomes: Vec<Option<ActionOutcome>> = vec![None; total];
        let mut any_failed = false;
        let mut peak_concurrency = 0;

        while !ready.is_empty() || !running.is_empty() {
            graph.sort_by_priority(actions, &mut ready);

            while running.len() < cap && !ready.is_empty() {
                let index = ready.remove(0);
                let action = actions[index].clone();
                let tx = done_tx.clone();
                let handle = tokio::spawn(async move {
                    let result = runner.run(&action).await;
                    let _ = tx.send((index, result));
                });
                running.insert(index, handle);
            }
            peak_concurrency = peak_concurrency.max(running.len());

            // Block until something finishes, then drain whatever else has
            // already been buffered.
            let Some(first) = done_rx.recv().await else {
                break;
            };
            let mut completions = vec![first];
            while let Ok(more) = done_rx.try_recv() {
                completions.push(more);
            }

            for (index, result) in completions {
                if let Some(handle) = running.remove(&index) {
                    handle.await.map_err(|e| ExecError::Join(e.to_string()))?;
                }

                let outcome = result?;
                log.action_completed(&actions[index], &outcome);
                progress.tick(&actions[index].status_description);

                if outcome.success() {
                    for dependent in graph.node(index).dependents.clone() {
                        let node = graph.node_mut(dependent);
                        node.pending_deps -= 1;
                        if node.pending_deps == 0 {
                            ready.push(dependent);
                        }
                    }
                } else {
                    any_failed = true;
                }
                outcomes[index] = Some(outcome);
            }

            if any_failed && self.cfg.stop_on_error {
                ready.clear();
            }
        }

        let executed = outcomes.iter().filter(|o| o.is_some()).count();
        let failed = outcomes
            .iter()
            .filter(|o| o.as_ref().is_some_and(|o| !o.success()))
            .count();
        let success = !any_failed && executed == total;

        progress.finish(success);
        log.run_end(success, start.elapsed());

        if self.cfg.detailed_stats {
            let entries: Vec<(&Action, &ActionOutcome)> = outcomes
                .iter()
                .enumerate()
                .filter_map(|(i, o)| o.as_ref().map(|o| (&actions[i], o)))
                .collect();
            emit_detailed_stats(&entries);
        }

        Ok((
            success,
            ExecutionSummary {
                total,
                executed,
                failed,
                skipped: total - executed,
                peak_concurrency,
                duration: start.elapsed(),
            },
        ))
    }
}

#[async_trait]
impl ActionExecutor for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(&self, actions: &[Action]) -> Result<bool, ExecError> {
        let (success, _) = self.execute_with_summary(actions).await?;
        Ok(success)
    }
}
