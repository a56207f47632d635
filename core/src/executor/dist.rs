use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::action::{Action, ActionOutcome};
use crate::config::{ExecutorConfig, DRIVER_ENV};
use crate::error::{ExecError, RunnerError};
use crate::executor::ActionExecutor;
use crate::graph::ActionGraph;
use crate::output::RunLog;
use crate::runner::{find_in_system_path, Priority, ProcessRunner};

/// Default name of the distributed-build driver binary, searched on PATH
/// when neither config nor `FORGEFLOW_DIST_DRIVER` name one.
pub const DRIVER_BINARY: &str = "forgeflow-dist";

/// Exit code recorded for actions failed by wave- or dependency-level
/// propagation rather than their own process.
const PROPAGATED_FAILURE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletionState {
    NotStarted,
    InFlight,
    Done(i32),
}

impl CompletionState {
    fn succeeded(self) -> bool {
        self == CompletionState::Done(0)
    }

    fn failed(self) -> bool {
        matches!(self, CompletionState::Done(code) if code != 0)
    }
}

/// Hands remote-eligible actions to an external distributed-build driver
/// in successive waves; everything else runs through a bounded polling
/// fallback on the local machine.
///
/// Waves are strictly sequential. A nonzero driver exit fails every action
/// claimed in that wave; the driver reports no finer granularity.
pub struct DistributedExecutor {
    cfg: ExecutorConfig,
    driver: PathBuf,
}

impl DistributedExecutor {
    /// Probe for the driver binary. Checked once at startup; callers must
    /// not construct this executor when the probe fails.
    pub fn is_available(cfg: &ExecutorConfig) -> bool {
        resolve_driver(cfg).is_some()
    }

    pub fn new(cfg: ExecutorConfig) -> Result<Self, ExecError> {
        let driver = resolve_driver(&cfg).ok_or_else(|| {
            ExecError::DriverUnavailable(format!(
                "no driver binary; set driver_path, {DRIVER_ENV}, or put {DRIVER_BINARY} on PATH"
            ))
        })?;
        Ok(Self { cfg, driver })
    }

    async fn run(&self, actions: &[Action]) -> Result<bool, ExecError> {
        let start = Instant::now();
        let total = actions.len();
        let graph = ActionGraph::build(actions)?;
        let mut states = vec![CompletionState::NotStarted; total];
        let mut log = RunLog::new(total);
        log.run_start("distributed");

        let script_dir = std::env::temp_dir();
        let mut wave = 0usize;

        while states.iter().any(|s| *s == CompletionState::NotStarted) {
            wave += 1;

            propagate_failures(&graph, &mut states, actions, &mut log);

            // Classify everything whose dependencies are all satisfied.
            let mut claimed: Vec<usize> = Vec::new();
            let mut fallback: Vec<usize> = Vec::new();
            for index in 0..total {
                if states[index] != CompletionState::NotStarted {
                    continue;
                }
                let deps_done = graph
                    .node(index)
                    .dependencies
                    .iter()
                    .all(|&dep| states[dep].succeeded());
                if deps_done {
                    states[index] = CompletionState::InFlight;
                    if actions[index].remote_eligible() {
                        claimed.push(index);
                    } else {
                        fallback.push(index);
                    }
                }
            }

            if claimed.is_empty() && fallback.is_empty() {
                // Everything left is blocked behind a failure; propagation
                // above will clear it on the next pass, so nothing should
                // reach here with NotStarted entries remaining.
                break;
            }

            log.wave_start(wave, claimed.len());

            let wave_fut = self.run_wave(&script_dir, log.run_id(), wave, actions, &claimed);
            let fallback_fut = self.run_fallback(actions, &fallback);
            let (wave_result, fallback_results) = tokio::join!(wave_fut, fallback_fut);

            let wave_exit = wave_result?;
            for &index in &claimed {
                states[index] = CompletionState::Done(wave_exit);
                let outcome = ActionOutcome::from_exit(wave_exit);
                log.action_completed(&actions[index], &outcome);
            }
            log.wave_end(wave, wave_exit == 0);

            for (index, outcome) in fallback_results? {
                states[index] = CompletionState::Done(outcome.exit_code);
                log.action_completed(&actions[index], &outcome);
            }
        }

        let success = !states.iter().any(|s| s.failed())
            && states.iter().all(|s| matches!(s, CompletionState::Done(_)));
        log.run_end(success, start.elapsed());
        Ok(success)
    }

    /// Write the wave's quoted command lines to a script file and invoke
    /// the driver once, synchronously, for the whole wave.
    async fn run_wave(
        &self,
        script_dir: &Path,
        run_id: &str,
        wave: usize,
        actions: &[Action],
        claimed: &[usize],
    ) -> Result<i32, ExecError> {
        if claimed.is_empty() {
            return Ok(0);
        }

        let mut script = String::new();
        for &index in claimed {
            script.push_str(&actions[index].command_line());
            script.push('\n');
        }
        let script_path = script_dir.join(format!("forgeflow-wave-{run_id}-{wave}.txt"));
        tokio::fs::write(&script_path, script).await?;

        let mut driver_action = Action::new(
            crate::action::ActionKind::BuildProject,
            self.driver.clone(),
            script_dir,
        );
        driver_action.arguments = format!("\"{}\"", script_path.display());
        driver_action.status_description = format!("wave {wave}");

        let outcome = ProcessRunner::new(Priority::Normal)
            .run(&driver_action)
            .await
            .map_err(|e| ExecError::Driver(e.to_string()))?;

        for line in &outcome.log_lines {
            println!("{line}");
        }
        let _ = tokio::fs::remove_file(&script_path).await;

        Ok(outcome.exit_code)
    }

    /// Polling loop for non-eligible actions: bounded by the physical core
    /// count, re-checking for free slots and completions every poll
    /// interval.
    async fn run_fallback(
        &self,
        actions: &[Action],
        indices: &[usize],
    ) -> Result<Vec<(usize, ActionOutcome)>, ExecError> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let cap = num_cpus::get_physical().max(1);
        let runner = ProcessRunner::new(Priority::BelowNormal);
        let (done_tx, mut done_rx) =
            mpsc::unbounded_channel::<(usize, Result<ActionOutcome, RunnerError>)>();

        let mut queue: Vec<usize> = indices.to_vec();
        let mut in_flight: FuturesUnordered<tokio::task::JoinHandle<()>> = FuturesUnordered::new();
        let mut results = Vec::with_capacity(indices.len());

        while results.len() < indices.len() {
            while in_flight.len() < cap && !queue.is_empty() {
                let index = queue.remove(0);
                let action = actions[index].clone();
                let tx = done_tx.clone();
                in_flight.push(tokio::spawn(async move {
                    let result = runner.run(&action).await;
                    let _ = tx.send((index, result));
                }));
            }

            tokio::select! {
                joined = in_flight.next(), if !in_flight.is_empty() => {
                    if let Some(joined) = joined {
                        joined.map_err(|e| ExecError::Join(e.to_string()))?;
                    }
                }
                _ = tokio::time::sleep(self.cfg.poll_interval()) => {}
            }

            while let Ok((index, result)) = done_rx.try_recv() {
                results.push((index, result?));
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl ActionExecutor for DistributedExecutor {
    fn name(&self) -> &str {
        "distributed"
    }

    async fn execute(&self, actions: &[Action]) -> Result<bool, ExecError> {
        self.run(actions).await
    }
}

/// Mark every not-started action behind a failed dependency as failed,
/// transitively, without consuming a slot.
fn propagate_failures(
    graph: &ActionGraph,
    states: &mut [CompletionState],
    actions: &[Action],
    log: &mut RunLog,
) {
    loop {
        let mut changed = false;
        for index in 0..states.len() {
            if states[index] != CompletionState::NotStarted {
                continue;
            }
            let blocked = graph
                .node(index)
                .dependencies
                .iter()
                .any(|&dep| states[dep].failed());
            if blocked {
                states[index] = CompletionState::Done(PROPAGATED_FAILURE);
                log.action_completed(
                    &actions[index],
                    &ActionOutcome::from_exit(PROPAGATED_FAILURE),
                );
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn resolve_driver(cfg: &ExecutorConfig) -> Option<PathBuf> {
    if let Some(path) = &cfg.driver_path {
        if path.is_file() {
            return Some(path.clone());
        }
        tracing::warn!(path = %path.display(), "configured driver binary does not exist");
        return None;
    }
    if let Ok(v) = std::env::var(DRIVER_ENV) {
        if !v.trim().is_empty() {
            let path = PathBuf::from(v);
            if path.is_file() {
                return Some(path);
            }
            return None;
        }
    }
    find_in_system_path(Path::new(DRIVER_BINARY))
}
