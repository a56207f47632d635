use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while linking actions into a dependency graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("action graph contains cycle:\n{0}")]
    CyclicDependencies(String),
}

/// Errors raised while spawning or supervising a child process.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("command not found: {0}")]
    CommandNotFound(PathBuf),

    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the executors. A nonzero action exit code is not an
/// error; it is recorded on the action's outcome and reflected in the
/// overall boolean result.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("distributed driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("distributed driver failed: {0}")]
    Driver(String),

    #[error("worker task failed: {0}")]
    Join(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
