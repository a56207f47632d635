use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Enumerates build action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    BuildProject,
    Compile,
    CreateAppBundle,
    GenerateDebugInfo,
    Link,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildProject => "BuildProject",
            Self::Compile => "Compile",
            Self::CreateAppBundle => "CreateAppBundle",
            Self::GenerateDebugInfo => "GenerateDebugInfo",
            Self::Link => "Link",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single build action: one external process invocation with declared
/// input and output files. Immutable once handed to an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// The type of this action (for stats and log grouping).
    pub kind: ActionKind,

    /// The command to run to create produced items.
    pub command: PathBuf,

    /// Command-line parameters to pass to the program, as a single string.
    #[serde(default)]
    pub arguments: String,

    /// Directory from which to execute the program.
    pub working_dir: PathBuf,

    /// Every file this action depends on. Prerequisites not produced by
    /// another action in the same list are treated as source inputs.
    #[serde(default)]
    pub prerequisites: Vec<PathBuf>,

    /// The files this action produces after completing.
    #[serde(default)]
    pub produced: Vec<PathBuf>,

    /// Friendly description of the kind of work, e.g. "Compile" or "Link".
    #[serde(default)]
    pub description: String,

    /// Human-readable status shown when the action completes. Often the
    /// name of the file being compiled or linked.
    #[serde(default = "default_status")]
    pub status_description: String,

    /// True if this action may run on a remote machine.
    #[serde(default)]
    pub can_execute_remotely: bool,

    /// True if this action may be handed to the distributed build service.
    /// Requires `can_execute_remotely` as well.
    #[serde(default = "default_true")]
    pub can_execute_on_service: bool,

    /// Whether completion of this action prints its status line. Useful to
    /// silence tools that produce no console output of their own.
    #[serde(default = "default_true")]
    pub emit_status: bool,
}

fn default_status() -> String {
    "...".to_string()
}

fn default_true() -> bool {
    true
}

impl Action {
    pub fn new(kind: ActionKind, command: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            command: command.into(),
            arguments: String::new(),
            working_dir: working_dir.into(),
            prerequisites: Vec::new(),
            produced: Vec::new(),
            description: String::new(),
            status_description: default_status(),
            can_execute_remotely: false,
            can_execute_on_service: true,
            emit_status: true,
        }
    }

    /// True if the distributed backend may claim this action.
    pub fn remote_eligible(&self) -> bool {
        self.can_execute_remotely && self.can_execute_on_service
    }

    /// Command path plus arguments, fully quoted, one line. This is the
    /// form written into distributed wave scripts.
    pub fn command_line(&self) -> String {
        if self.arguments.is_empty() {
            format!("\"{}\"", self.command.display())
        } else {
            format!("\"{}\" {}", self.command.display(), self.arguments)
        }
    }

    /// File name of the tool binary, for the detailed stats table.
    pub fn tool_name(&self) -> String {
        self.command
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.command.display().to_string())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.command.display(), self.arguments)
    }
}

/// Result of running a single action to completion.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Exit code of the spawned process (0 = success).
    pub exit_code: i32,

    /// Combined stdout/stderr, line by line, in read order.
    pub log_lines: Vec<String>,

    /// Wall-clock duration of the process.
    pub duration: Duration,
}

impl ActionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Outcome synthesized from an exit code alone, for actions resolved
    /// without a local process: wave-level results and propagated skips.
    pub fn from_exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            log_lines: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}
