use std::time::Duration;

use chrono::Local;
use uuid::Uuid;

use crate::action::{Action, ActionOutcome};

/// Completion-ordered log stream for one run.
///
/// Actions are announced as they finish, not as they are submitted, under
/// a running `[completed/total]` prefix.
pub struct RunLog {
    run_id: String,
    total: usize,
    completed: usize,
}

impl RunLog {
    pub fn new(total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            total,
            completed: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_start(&self, executor: &str) {
        tracing::info!(
            run_id = %self.run_id,
            executor,
            total = self.total,
            ts = %Local::now().to_rfc3339(),
            "run started"
        );
    }

    /// Announce a completed action and emit its captured output. The
    /// counter always advances; the status line is suppressed when the
    /// action asked for silence.
    pub fn action_completed(&mut self, action: &Action, outcome: &ActionOutcome) {
        self.completed += 1;
        if action.emit_status {
            println!("[{}/{}] {}", self.completed, self.total, action.status_description);
        }
        for line in &outcome.log_lines {
            println!("{line}");
        }
        if !outcome.success() {
            tracing::error!(
                run_id = %self.run_id,
                action = %action.status_description,
                exit_code = outcome.exit_code,
                "action failed"
            );
        }
    }

    pub fn wave_start(&self, wave: usize, claimed: usize) {
        tracing::info!(run_id = %self.run_id, wave, claimed, "distributed wave dispatched");
    }

    pub fn wave_end(&self, wave: usize, success: bool) {
        tracing::info!(run_id = %self.run_id, wave, success, "distributed wave finished");
    }

    pub fn run_end(&self, success: bool, duration: Duration) {
        tracing::info!(
            run_id = %self.run_id,
            success,
            completed = self.completed,
            total = self.total,
            duration_ms = duration.as_millis() as u64,
            "run finished"
        );
    }
}

/// Per-action stats table logged after a run when detailed stats are on.
/// Columns follow the classic executor report: kind, duration, tool,
/// description.
pub fn emit_detailed_stats(entries: &[(&Action, &ActionOutcome)]) {
    tracing::info!("{:<20} {:>10}  {:<16} {}", "Kind", "Duration", "Tool", "Description");
    for (action, outcome) in entries {
        tracing::info!(
            "{:<20} {:>9.3}s  {:<16} {}",
            action.kind.as_str(),
            outcome.duration.as_secs_f64(),
            action.tool_name(),
            action.status_description,
        );
    }

    let mut per_kind: Vec<(&str, usize, Duration)> = Vec::new();
    for (action, outcome) in entries {
        match per_kind.iter_mut().find(|(kind, _, _)| *kind == action.kind.as_str()) {
            Some((_, count, total)) => {
                *count += 1;
                *total += outcome.duration;
            }
            None => per_kind.push((action.kind.as_str(), 1, outcome.duration)),
        }
    }
    for (kind, count, total) in per_kind {
        tracing::info!("{kind}: {count} actions, {:.3}s total", total.as_secs_f64());
    }
}
