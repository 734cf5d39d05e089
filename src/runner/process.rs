use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::adapter::TestCommand;
use super::process_tree;

/// Bound on draining output after the child exits or is killed. Orphaned
/// grandchildren can hold the pipes open indefinitely.
const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Stderr kept for the failure detail; the full stream is still forwarded.
const MAX_STDERR_BYTES: usize = 256 * 1024;

/// Failure detail when the process failed without writing to stderr.
pub const GENERIC_FAILURE: &str = "Test failed";

pub const CANCELLED_DETAIL: &str = "Cancelled by user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// How one child process ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Passed,
    /// Nonzero exit (or killed by a signal, with no exit code).
    Failed { exit_code: Option<i32>, detail: String },
    /// The executable could not be started at all.
    SpawnFailed(String),
    Cancelled,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Passed)
    }

    /// Error text recorded for a failed iteration.
    pub fn error_detail(&self) -> Option<String> {
        match self {
            ProcessOutcome::Passed => None,
            ProcessOutcome::Failed { detail, .. } => Some(detail.clone()),
            ProcessOutcome::SpawnFailed(reason) => Some(reason.clone()),
            ProcessOutcome::Cancelled => Some(CANCELLED_DETAIL.to_string()),
        }
    }
}

/// Runs one child process at a time. `run` takes `&mut self`, so a second run
/// cannot start while a child is live; cancellation goes through the token.
pub struct ProcessRunner {
    cancel: CancellationToken,
}

impl ProcessRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Token that, when cancelled, kills the live child and its descendants.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Spawn `command` in `cwd` with its environment overlay on top of the
    /// ambient environment, forwarding each output line to `sink` as it
    /// arrives.
    pub async fn run(
        &mut self,
        command: &TestCommand,
        cwd: &Path,
        sink: &(dyn Fn(Stream, &str) + Sync),
    ) -> ProcessOutcome {
        if self.cancel.is_cancelled() {
            return ProcessOutcome::Cancelled;
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so the whole tree can be signalled at once.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let reason = crate::Error::SpawnFailed {
                    program: command.program.clone(),
                    reason: e.to_string(),
                }
                .to_string();
                tracing::warn!("{}", reason);
                return ProcessOutcome::SpawnFailed(reason);
            }
        };
        let pid = child.id();
        tracing::debug!("Spawned {} (pid {:?}) in {}", command.program, pid, cwd.display());

        let (tx, mut rx) = mpsc::unbounded_channel::<(Stream, String)>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, Stream::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, Stream::Stderr, tx.clone())));
        }
        drop(tx);

        let mut stderr = String::new();
        let mut on_line = |stream: Stream, line: String| {
            sink(stream, &line);
            if stream == Stream::Stderr && stderr.len() < MAX_STDERR_BYTES {
                stderr.push_str(&line);
                stderr.push('\n');
            }
        };

        let waited = loop {
            tokio::select! {
                Some((stream, line)) = rx.recv() => on_line(stream, line),
                status = child.wait() => break Some(status),
                () = self.cancel.cancelled() => {
                    tracing::info!("Cancellation requested; killing process tree");
                    match pid {
                        Some(pid) => process_tree::kill_process_tree(pid),
                        None => {
                            if let Err(e) = child.start_kill() {
                                tracing::warn!("Failed to kill cancelled process: {}", e);
                            }
                        }
                    }
                    let _ = child.wait().await;
                    break None;
                }
            }
        };

        // Pipes close once every holder is gone; bounded in case one lingers.
        let drained = timeout(IO_CAPTURE_TIMEOUT, async {
            while let Some((stream, line)) = rx.recv().await {
                on_line(stream, line);
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!("Output capture timed out; a descendant may still hold the pipes");
            for reader in &readers {
                reader.abort();
            }
        }

        match waited {
            None => ProcessOutcome::Cancelled,
            Some(Ok(status)) if status.success() => ProcessOutcome::Passed,
            Some(Ok(status)) => {
                let detail = stderr.trim();
                ProcessOutcome::Failed {
                    exit_code: status.code(),
                    detail: if detail.is_empty() {
                        GENERIC_FAILURE.to_string()
                    } else {
                        detail.to_string()
                    },
                }
            }
            Some(Err(e)) => ProcessOutcome::Failed {
                exit_code: None,
                detail: format!("Failed waiting for process: {}", e),
            },
        }
    }
}

async fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send((stream, line)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Stopped reading {:?}: {}", stream, e);
                break;
            }
        }
    }
}
