use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("NO_WORKSPACE: No workspace root found for '{0}'. Pass --workspace explicitly.")]
    NoWorkspace(PathBuf),

    #[error("CONFIG_PARSE: Skipping config file {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("SPAWN_FAILED: Could not start '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("PROCESS_FAILED: Test process exited with {}: {detail}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "a signal".to_string()))]
    ProcessFailed { exit_code: Option<i32>, detail: String },

    #[error("CANCELLED: Test run cancelled by user")]
    Cancelled,

    #[error("MERGE_FAILED: {0}")]
    MergeFailed(String),

    #[error("INVALID_ITERATIONS: Iteration count must be positive (got {0})")]
    InvalidIterations(u32),

    #[error("UNKNOWN_ECOSYSTEM: '{0}' is not one of javascript, typescript, python, java, csharp")]
    UnknownEcosystem(String),

    #[error("NO_TEST_AT_LINE: No test declaration found at or above line {line} in {path}")]
    NoTestAtLine { path: PathBuf, line: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
