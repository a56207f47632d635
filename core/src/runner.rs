use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::action::{Action, ActionOutcome};
use crate::error::RunnerError;

/// Scheduling priority for spawned children. Build tools run below the
/// interactive baseline so a saturated build keeps the machine usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    BelowNormal,
}

/// Spawns one external process per action, captures combined output and
/// exit code, and guarantees child cleanup.
///
/// Children are placed in their own process group with kill-on-drop, so an
/// abnormal teardown of the runner reaps the child and its descendants.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    priority: Priority,
}

impl ProcessRunner {
    pub fn new(priority: Priority) -> Self {
        Self { priority }
    }

    /// Run an action's command to completion, blocking the calling task.
    ///
    /// Fails fast with `CommandNotFound` before spawning if the command
    /// path does not resolve to an existing file.
    pub async fn run(&self, action: &Action) -> Result<ActionOutcome, RunnerError> {
        let command_path = resolve_command(&action.command)?;
        let args = split_arguments(&action.arguments);

        let mut cmd = Command::new(&command_path);
        cmd.args(&args)
            .current_dir(&action.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            cmd.process_group(0);
            if self.priority == Priority::BelowNormal {
                unsafe {
                    cmd.pre_exec(|| {
                        libc::nice(5);
                        Ok(())
                    });
                }
            }
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| RunnerError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Spawn("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Spawn("stderr not captured".to_string()))?;

        // Both streams feed one channel; lines land in read order.
        let (line_tx, mut line_rx) = mpsc::channel::<String>(256);
        let out_task = pump_lines(stdout, line_tx.clone());
        let err_task = pump_lines(stderr, line_tx);

        let mut log_lines = Vec::new();
        while let Some(line) = line_rx.recv().await {
            log_lines.push(line);
        }
        let _ = out_task.await;
        let _ = err_task.await;

        let status = child.wait().await?;

        Ok(ActionOutcome {
            exit_code: normalize_exit(status),
            log_lines,
            duration: start.elapsed(),
        })
    }
}

fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    })
}

/// Resolve a command to an existing file: absolute or relative paths are
/// checked directly, bare names are searched on PATH.
fn resolve_command(command: &Path) -> Result<PathBuf, RunnerError> {
    if command.components().count() > 1 || command.is_absolute() {
        if command.is_file() {
            return Ok(command.to_path_buf());
        }
        return Err(RunnerError::CommandNotFound(command.to_path_buf()));
    }

    find_in_system_path(command).ok_or_else(|| RunnerError::CommandNotFound(command.to_path_buf()))
}

/// Search PATH for an executable with the given name.
pub(crate) fn find_in_system_path(name: &Path) -> Option<PathBuf> {
    let path_env = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_env) {
        let candidate = dir.join(name);
        if candidate.is_file() && is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Split an argument string on whitespace, honoring single and double
/// quotes so quoted paths stay whole.
pub fn split_arguments(arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_part = false;
    let mut quote: Option<char> = None;

    for c in arguments.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    in_part = true;
                }
                c if c.is_whitespace() => {
                    if in_part {
                        args.push(std::mem::take(&mut current));
                        in_part = false;
                    }
                }
                c => {
                    current.push(c);
                    in_part = true;
                }
            },
        }
    }
    if in_part {
        args.push(current);
    }
    args
}

fn normalize_exit(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            128 + sig
        } else {
            1
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}
