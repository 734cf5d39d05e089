//! Repeated execution of one test: command planning, sequential iterations,
//! cancellation, report merging and the run summary.

pub mod adapter;
pub mod builder;
pub mod dotnet_adapter;
pub mod env_file;
pub mod maven_adapter;
pub mod merge;
pub mod output;
pub mod playwright_adapter;
pub mod process;
pub mod process_tree;
pub mod pytest_adapter;

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::RunnerSettings;
use crate::discovery;
use crate::ecosystem::Ecosystem;
use builder::{BuildRequest, CommandBuilder, CommandPlanner, EffectiveSettings};
use merge::ReportMerger;
use process::{ProcessOutcome, ProcessRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationResult {
    /// 1-based.
    pub iteration: u32,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub iteration: u32,
    pub total: u32,
    /// Share of the run one iteration represents.
    pub increment_percent: f64,
}

/// Receives the user-facing run log. Implementations must not block.
pub trait RunObserver: Send + Sync {
    fn log(&self, line: &str);

    fn progress(&self, _progress: &Progress) {}

    fn report_ready(&self, _path: &Path) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: u32,
    pub requested: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub success_rate_percent: f64,
    pub total_duration_ms: u64,
    pub average_duration_ms: u64,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub iterations: Vec<IterationResult>,
}

impl RunSummary {
    pub fn new(
        iterations: Vec<IterationResult>,
        requested: u32,
        state: RunState,
        report_path: Option<PathBuf>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let total = iterations.len() as u32;
        let succeeded = iterations.iter().filter(|r| r.success).count() as u32;
        let total_duration_ms: u64 = iterations.iter().map(|r| r.duration_ms).sum();
        let (success_rate_percent, average_duration_ms) = if total == 0 {
            (0.0, 0)
        } else {
            (
                succeeded as f64 * 100.0 / total as f64,
                total_duration_ms / total as u64,
            )
        };
        Self {
            total,
            requested,
            succeeded,
            failed: total - succeeded,
            success_rate_percent,
            total_duration_ms,
            average_duration_ms,
            state,
            report_path,
            started_at,
            finished_at: Utc::now(),
            iterations,
        }
    }
}

/// What to run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub test_path: PathBuf,
    pub ecosystem: Ecosystem,
    pub test_name: Option<String>,
    pub iterations: u32,
    pub workspace_root: PathBuf,
    pub settings: RunnerSettings,
}

/// Working state of one run. Owns the process runner, and through it the
/// only live child process.
pub struct RunSession {
    request: RunRequest,
    runner: ProcessRunner,
    results: Vec<IterationResult>,
    state: RunState,
}

impl RunSession {
    pub fn new(request: RunRequest, cancel: CancellationToken) -> Self {
        Self {
            request,
            runner: ProcessRunner::new(cancel),
            results: Vec::new(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn results(&self) -> &[IterationResult] {
        &self.results
    }

    fn is_cancelled(&self) -> bool {
        self.runner.cancel_token().is_cancelled()
    }
}

/// Runs a test N times in sequence.
pub struct Orchestrator<P: CommandPlanner = CommandBuilder> {
    planner: P,
}

impl Default for Orchestrator<CommandBuilder> {
    fn default() -> Self {
        Self::new(CommandBuilder)
    }
}

impl<P: CommandPlanner> Orchestrator<P> {
    pub fn new(planner: P) -> Self {
        Self { planner }
    }

    /// Run every iteration, then merge reports and summarize. Partial and
    /// cancelled runs are still merged and summarized.
    pub async fn run_repeated(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
        observer: &dyn RunObserver,
    ) -> crate::Result<RunSummary> {
        if request.iterations == 0 {
            return Err(crate::Error::InvalidIterations(request.iterations));
        }
        if !request.workspace_root.is_dir() {
            return Err(crate::Error::NoWorkspace(request.test_path.clone()));
        }

        let started_at = Utc::now();
        let mut session = RunSession::new(request, cancel);
        self.run_iterations(&mut session, observer).await;

        let request = &session.request;
        let merger =
            ReportMerger::new(self.planner.adapter(request.ecosystem), &request.workspace_root);
        let config = discovery::read_config(
            &request.test_path,
            request.ecosystem,
            Some(request.workspace_root.as_path()),
        );
        let report_path = merger.merge(config.as_ref(), observer).await;
        if let Some(ref path) = report_path {
            observer.report_ready(path);
        }

        let summary = RunSummary::new(
            std::mem::take(&mut session.results),
            session.request.iterations,
            session.state,
            report_path,
            started_at,
        );
        for line in output::format_summary(&summary) {
            observer.log(&line);
        }
        tracing::info!(
            "Run finished: {}/{} passed, state {:?}",
            summary.succeeded,
            summary.total,
            summary.state
        );
        Ok(summary)
    }

    async fn run_iterations(&self, session: &mut RunSession, observer: &dyn RunObserver) {
        session.state = RunState::Running;
        let total = session.request.iterations;
        tracing::info!(
            "Running {} {} times ({})",
            session.request.test_path.display(),
            total,
            session.request.ecosystem
        );

        for iteration in 1..=total {
            if session.is_cancelled() {
                observer.log(&format!("Test execution cancelled at iteration {}", iteration));
                session.state = RunState::Cancelled;
                break;
            }

            if session.request.settings.show_progress {
                observer.progress(&Progress {
                    iteration,
                    total,
                    increment_percent: 100.0 / total as f64,
                });
            }
            observer.log("");
            observer.log(&format!("=== Iteration {}/{} ===", iteration, total));

            let started_at = Utc::now();
            let started = Instant::now();
            let outcome = match self.plan(session, iteration) {
                Ok(plan) => {
                    log_plan(&plan, &session.request, observer);
                    let sink = |_: process::Stream, line: &str| observer.log(line);
                    session
                        .runner
                        .run(&plan.command, &session.request.workspace_root, &sink)
                        .await
                }
                Err(e) => {
                    tracing::warn!("Could not build command for iteration {}: {}", iteration, e);
                    ProcessOutcome::Failed { exit_code: None, detail: e.to_string() }
                }
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            let result = IterationResult {
                iteration,
                success: outcome.is_success(),
                duration_ms,
                error: outcome.error_detail(),
                started_at,
            };
            log_result(&result, observer);
            session.results.push(result);

            if outcome == ProcessOutcome::Cancelled {
                observer.log(&format!("Test execution cancelled at iteration {}", iteration));
                session.state = RunState::Cancelled;
                break;
            }
            if !outcome.is_success() && session.request.settings.stop_on_first_failure {
                observer.log(&format!("Stopping execution due to failure at iteration {}", iteration));
                break;
            }
        }

        if session.state == RunState::Running {
            session.state = RunState::Completed;
        }
    }

    fn plan(&self, session: &RunSession, iteration: u32) -> crate::Result<EffectiveSettings> {
        let request = &session.request;
        self.planner.plan(&BuildRequest {
            test_path: &request.test_path,
            ecosystem: request.ecosystem,
            test_name: request.test_name.as_deref(),
            workspace_root: &request.workspace_root,
            settings: &request.settings,
            iteration: Some(iteration),
        })
    }
}

fn log_plan(plan: &EffectiveSettings, request: &RunRequest, observer: &dyn RunObserver) {
    observer.log(&format!("Executing: {}", plan.command));
    observer.log(&format!("Working directory: {}", request.workspace_root.display()));
    observer.log(&format!("Test file: {}", request.test_path.display()));
    if let Some(ref name) = request.test_name {
        observer.log(&format!("Test name: {}", name));
    }

    match plan.config {
        Some(ref config) => {
            if let Some(ref path) = plan.config_path {
                observer.log(&format!("Config file: {}", path.display()));
            }
            for line in config.describe() {
                observer.log(&line);
            }
        }
        None => observer.log("No Playwright config found, using defaults"),
    }
    observer.log(&format!("Headed: {}", plan.run_headed));

    observer.log(&format!(
        "Loaded {} environment variables from .env files",
        plan.env_file_keys.len()
    ));
    if !plan.env_file_keys.is_empty() {
        observer.log(&format!("Env vars loaded: {}", plan.env_file_keys.join(", ")));
    }
    if let Some(ref path) = plan.artifact_path {
        observer.log(&format!("Blob report output: {}", path.display()));
    }
}

fn log_result(result: &IterationResult, observer: &dyn RunObserver) {
    let duration = output::format_duration(result.duration_ms);
    match result.error {
        None => observer.log(&format!("✅ Iteration {} passed ({})", result.iteration, duration)),
        Some(ref error) => {
            let first_line = error.lines().next().unwrap_or("");
            observer.log(&format!(
                "❌ Iteration {} failed ({}): {}",
                result.iteration, duration, first_line
            ));
        }
    }
}

/// Run with the real command builder.
pub async fn run_repeated(
    request: RunRequest,
    cancel: CancellationToken,
    observer: &dyn RunObserver,
) -> crate::Result<RunSummary> {
    Orchestrator::default().run_repeated(request, cancel, observer).await
}
