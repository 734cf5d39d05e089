#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use retest::config::RunnerSettings;
use retest::ecosystem::Ecosystem;
use retest::runner::adapter::{BuildContext, CommandAdapter, ReportMergeSpec, TestCommand};
use retest::runner::builder::{BuildRequest, CommandPlanner, EffectiveSettings};
use retest::runner::{Progress, RunObserver, RunRequest};
use tokio_util::sync::CancellationToken;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Plans `sh -c <script>` for each iteration instead of a real test runner.
/// Every spawned script first appends its iteration to `spawned.log` in the
/// workspace, so tests can check what actually ran.
pub struct ScriptedPlanner {
    script: Box<dyn Fn(u32) -> String + Send + Sync>,
    blob_reports: bool,
}

impl ScriptedPlanner {
    pub fn new(script: impl Fn(u32) -> String + Send + Sync + 'static) -> Self {
        Self { script: Box::new(script), blob_reports: false }
    }

    /// Each iteration also writes `blob-report/report-<i>.zip`, and reports
    /// are merged by [`ScriptedMerge`].
    pub fn with_blob_reports(mut self) -> Self {
        self.blob_reports = true;
        self
    }

    /// Passes every iteration except those listed.
    pub fn failing_at(failures: &'static [u32]) -> Self {
        Self::new(move |i| {
            if failures.contains(&i) {
                format!("echo 'iteration {} broke' >&2; exit 1", i)
            } else {
                format!("echo 'iteration {} ok'", i)
            }
        })
    }
}

impl CommandPlanner for ScriptedPlanner {
    fn plan(&self, request: &BuildRequest<'_>) -> retest::Result<EffectiveSettings> {
        let iteration = request.iteration.unwrap_or(1);
        let mut script = format!("echo {} >> spawned.log; ", iteration);
        if self.blob_reports {
            script.push_str(&format!(
                "mkdir -p blob-report && echo PK > blob-report/report-{}.zip; ",
                iteration
            ));
        }
        script.push_str(&(self.script)(iteration));
        Ok(EffectiveSettings {
            run_headed: request.settings.run_headed,
            command: TestCommand::new("sh").args(["-c".to_string(), script]),
            config: None,
            config_path: None,
            env_file_keys: Vec::new(),
            artifact_path: None,
        })
    }

    fn adapter(&self, ecosystem: Ecosystem) -> &dyn CommandAdapter {
        if self.blob_reports {
            return &ScriptedMerge;
        }
        retest::runner::builder::adapter_for(ecosystem)
    }
}

pub static SCRIPTED_BLOBS: ReportMergeSpec = ReportMergeSpec {
    artifact_dir: "blob-report",
    artifact_env: "RETEST_BLOB_FILE",
    artifact_extension: "zip",
    default_output_dir: "merged-report",
    output_env: "RETEST_MERGED_DIR",
    entry_point: "index.html",
};

/// Merges by listing the artifacts it was handed into `index.html`.
pub struct ScriptedMerge;

impl CommandAdapter for ScriptedMerge {
    fn name(&self) -> &str {
        "scripted"
    }

    fn workspace_markers(&self) -> &'static [&'static str] {
        &[]
    }

    fn build_command(&self, _ctx: &BuildContext<'_>) -> retest::Result<TestCommand> {
        Ok(TestCommand::new("true"))
    }

    fn report_merge(&self) -> Option<&'static ReportMergeSpec> {
        Some(&SCRIPTED_BLOBS)
    }

    fn merge_command(&self, artifact_dir: &Path) -> Option<TestCommand> {
        let script = format!(
            r#"mkdir -p "$RETEST_MERGED_DIR" && ls '{}' > "$RETEST_MERGED_DIR/index.html""#,
            artifact_dir.display()
        );
        Some(TestCommand::new("sh").args(["-c".to_string(), script]))
    }
}

/// Collects everything the orchestrator reports. Optionally cancels a token
/// when a given line shows up in the log.
#[derive(Default)]
pub struct RecordingObserver {
    pub lines: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<Progress>>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl RecordingObserver {
    pub fn cancelling_on(line: &str, token: CancellationToken) -> Self {
        Self {
            cancel_on: Some((line.to_string(), token)),
            ..Default::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl RunObserver for RecordingObserver {
    fn log(&self, line: &str) {
        if let Some((ref trigger, ref token)) = self.cancel_on {
            if line == trigger {
                token.cancel();
            }
        }
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn progress(&self, progress: &Progress) {
        self.progress.lock().unwrap().push(*progress);
    }
}

pub fn request(workspace: &Path, iterations: u32, stop_on_first_failure: bool) -> RunRequest {
    RunRequest {
        test_path: workspace.join("tests/flaky.spec.ts"),
        ecosystem: Ecosystem::JavaScript,
        test_name: None,
        iterations,
        workspace_root: workspace.to_path_buf(),
        settings: RunnerSettings {
            stop_on_first_failure,
            ..Default::default()
        },
    }
}

/// Iteration numbers recorded by spawned scripts, in spawn order.
pub fn spawned(workspace: &Path) -> Vec<u32> {
    std::fs::read_to_string(workspace.join("spawned.log"))
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}
